use bnlab_core::inference::{InferenceRequest, InferenceResult};
use bnlab_core::session::{Algorithm, SessionState};
use std::thread;
use std::time::Instant;

use crate::transport::{ServiceTransport, TransportError};

#[derive(Debug, Clone, PartialEq)]
pub enum InferenceOutcome {
    Single {
        algorithm: Algorithm,
        result: InferenceResult,
    },
    Compare {
        ve: InferenceResult,
        gibbs: InferenceResult,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error(transparent)]
    Request(#[from] TransportError),
    #[error("{algorithm} request failed: {source}")]
    CompareLeg {
        algorithm: Algorithm,
        #[source]
        source: TransportError,
    },
    #[error("inference worker stopped unexpectedly")]
    Aborted,
}

impl InferenceError {
    /// Text for the user-facing alert: the service's `detail` when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            InferenceError::Request(err) | InferenceError::CompareLeg { source: err, .. } => {
                err.to_string()
            }
            InferenceError::Aborted => self.to_string(),
        }
    }
}

/// Runs the session's query. `Ok(None)` when no network or query variable is chosen yet.
///
/// Compare mode sends the `ve` and `gibbs` requests at the same time and fails as a
/// whole if either does; there is no partial result.
pub fn run<T>(
    transport: &T,
    base: &str,
    state: &SessionState,
) -> Result<Option<InferenceOutcome>, InferenceError>
where
    T: ServiceTransport + ?Sized,
{
    if state.compare_enabled {
        let (Some(ve_request), Some(gibbs_request)) = (
            InferenceRequest::from_session(state, Algorithm::Ve),
            InferenceRequest::from_session(state, Algorithm::Gibbs),
        ) else {
            return Ok(None);
        };
        let (ve, gibbs) = thread::scope(|scope| {
            let ve = scope.spawn(|| timed_request(transport, base, &ve_request));
            let gibbs = scope.spawn(|| timed_request(transport, base, &gibbs_request));
            (ve.join(), gibbs.join())
        });
        let ve = leg_result(Algorithm::Ve, ve)?;
        let gibbs = leg_result(Algorithm::Gibbs, gibbs)?;
        return Ok(Some(InferenceOutcome::Compare { ve, gibbs }));
    }

    let Some(request) = InferenceRequest::from_session(state, state.algorithm) else {
        return Ok(None);
    };
    let result = timed_request(transport, base, &request)?;
    Ok(Some(InferenceOutcome::Single {
        algorithm: request.algorithm,
        result,
    }))
}

fn timed_request<T>(
    transport: &T,
    base: &str,
    request: &InferenceRequest,
) -> Result<InferenceResult, TransportError>
where
    T: ServiceTransport + ?Sized,
{
    let started_at = Instant::now();
    let outcome = transport.run_inference(base, request);
    crate::metrics::record_inference_outcome(outcome.is_ok(), started_at.elapsed());
    if let Err(err) = &outcome {
        log::warn!(
            "inference failed: network={}, algorithm={}, query={}, err={err}",
            request.network,
            request.algorithm,
            request.query_var
        );
    }
    outcome
}

fn leg_result(
    algorithm: Algorithm,
    joined: thread::Result<Result<InferenceResult, TransportError>>,
) -> Result<InferenceResult, InferenceError> {
    match joined {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(source)) => Err(InferenceError::CompareLeg { algorithm, source }),
        Err(_) => Err(InferenceError::Aborted),
    }
}
