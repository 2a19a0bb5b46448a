use bnlab_core::session::SessionState;
use bnlab_core::storage::Storage;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::controller::{ControllerError, SessionController};
use crate::presentation::PresentationEvent;
use crate::transport::HttpTransport;
use crate::{runtime_config, storage_helpers};

pub(crate) type ServiceController = SessionController<HttpTransport, Storage>;

static CONTROLLER: OnceLock<Mutex<ServiceController>> = OnceLock::new();

/// Result of one state-changing RPC call.
#[derive(Debug, Serialize)]
pub(crate) struct ActionReport {
    pub state: SessionState,
    pub events: Vec<PresentationEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn controller() -> Result<&'static Mutex<ServiceController>, String> {
    if let Some(controller) = CONTROLLER.get() {
        return Ok(controller);
    }
    let storage = storage_helpers::initialize_storage()?;
    let controller = SessionController::new(
        Arc::new(HttpTransport::from_env()),
        storage,
        runtime_config::resolve_candidates(),
        runtime_config::resolve_policy(),
    );
    Ok(CONTROLLER.get_or_init(|| Mutex::new(controller)))
}

fn lock() -> Result<MutexGuard<'static, ServiceController>, String> {
    controller()?
        .lock()
        .map_err(|_| "session lock poisoned".to_string())
}

fn report(
    controller: &ServiceController,
    events: Vec<PresentationEvent>,
    outcome: Result<(), ControllerError>,
) -> ActionReport {
    ActionReport {
        state: controller.state().clone(),
        events,
        error: outcome.err().map(|err| err.to_string()),
    }
}

pub(crate) fn read<R>(f: impl FnOnce(&ServiceController) -> R) -> Result<R, String> {
    let guard = lock()?;
    Ok(f(&*guard))
}

/// Runs `action` with the session locked for its whole duration.
pub(crate) fn apply<F>(action: F) -> Result<ActionReport, String>
where
    F: FnOnce(&mut ServiceController, &mut Vec<PresentationEvent>) -> Result<(), ControllerError>,
{
    let mut guard = lock()?;
    let mut events = Vec::new();
    let outcome = action(&mut *guard, &mut events);
    Ok(report(&guard, events, outcome))
}

/// Endpoint resolution runs with the lock released so `session/get` can show progress.
pub(crate) fn connect() -> Result<ActionReport, String> {
    let mut events = Vec::new();
    let pending = lock()?.begin_connect(&mut events);
    let pending = match pending {
        Ok(Some(pending)) => pending,
        Ok(None) => return Ok(report(&*lock()?, events, Ok(()))),
        Err(err) => return Ok(report(&*lock()?, events, Err(err))),
    };
    let run = pending.execute();
    let mut guard = lock()?;
    let outcome = guard.complete_connect(run, &mut events);
    Ok(report(&guard, events, outcome))
}

/// The inference round trip happens outside the lock; results are published under it.
pub(crate) fn run_inference() -> Result<ActionReport, String> {
    let mut events = Vec::new();
    let pending = lock()?.begin_run(&mut events);
    let pending = match pending {
        Ok(Some(pending)) => pending,
        Ok(None) => return Ok(report(&*lock()?, events, Ok(()))),
        Err(err) => return Ok(report(&*lock()?, events, Err(err))),
    };
    let outcome = pending.execute();
    let mut guard = lock()?;
    let outcome = guard.complete_run(pending.compare(), outcome, &mut events);
    Ok(report(&guard, events, outcome))
}
