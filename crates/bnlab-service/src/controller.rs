use bnlab_core::evidence::{EvidenceEffect, EvidenceMachine, EvidenceRejection};
use bnlab_core::network::{NetworkDescriptor, NetworkStats};
use bnlab_core::session::{
    Algorithm, CompareDisplayMode, KeyValueStore, SessionPatch, SessionState, SessionStore,
};
use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::endpoint::{
    resolve_catalog, AttemptFailure, ResolveError, ResolveStatus, ResolvedEndpoint, RetryPolicy,
};
use crate::inference::{self, InferenceError, InferenceOutcome};
use crate::presentation::{ControlsView, NoticeLevel, PresentationEvent, Presenter};
use crate::transport::ServiceTransport;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("inference service is not connected")]
    NotConnected,
    #[error("endpoint resolution is already running")]
    Resolving,
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
    #[error("unknown variable: {0}")]
    UnknownVariable(String),
    #[error(transparent)]
    Evidence(#[from] EvidenceRejection),
    #[error("algorithm is fixed while compare mode is on")]
    AlgorithmLocked,
    #[error("sample count must be a positive integer")]
    InvalidSampleCount,
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogState {
    Unresolved,
    Resolving,
    Ready {
        base: String,
        networks: Vec<NetworkDescriptor>,
    },
    Failed {
        message: String,
    },
}

/// Latest failed resolve attempt, readable while resolution runs outside the session lock.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink(Arc<Mutex<Option<AttemptFailure>>>);

impl DiagnosticSink {
    pub fn current(&self) -> Option<AttemptFailure> {
        self.0.lock().ok().and_then(|slot| slot.clone())
    }

    fn apply(&self, status: &ResolveStatus) {
        let Ok(mut slot) = self.0.lock() else {
            return;
        };
        *slot = match status {
            ResolveStatus::AttemptFailed(failure) => Some(failure.clone()),
            ResolveStatus::Cleared => None,
        };
    }
}

/// Resolution work detached from the controller so the session lock can be released.
pub struct PendingResolve<T: ?Sized> {
    transport: Arc<T>,
    candidates: Vec<String>,
    policy: RetryPolicy,
    diagnostics: DiagnosticSink,
}

pub struct ResolveRun {
    result: Result<ResolvedEndpoint, ResolveError>,
    statuses: Vec<ResolveStatus>,
}

impl<T: ServiceTransport + ?Sized> PendingResolve<T> {
    pub fn execute(self) -> ResolveRun {
        let mut statuses = Vec::new();
        let result = resolve_catalog(
            self.transport.as_ref(),
            &self.candidates,
            &self.policy,
            |status| {
                self.diagnostics.apply(&status);
                statuses.push(status);
            },
        );
        ResolveRun { result, statuses }
    }
}

/// One inference run. Executes without touching the controller.
pub struct PendingRun<T: ?Sized> {
    transport: Arc<T>,
    base: String,
    state: SessionState,
}

impl<T: ServiceTransport + ?Sized> PendingRun<T> {
    pub fn compare(&self) -> bool {
        self.state.compare_enabled
    }

    pub fn execute(&self) -> Result<Option<InferenceOutcome>, InferenceError> {
        inference::run(self.transport.as_ref(), &self.base, &self.state)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStatus {
    pub status: &'static str,
    pub base: Option<String>,
    pub networks: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub catalog: CatalogStatus,
    pub diagnostic: Option<AttemptFailure>,
    pub controls: ControlsView,
}

pub struct SessionController<T: ?Sized, S> {
    transport: Arc<T>,
    candidates: Vec<String>,
    policy: RetryPolicy,
    store: SessionStore<S>,
    machine: EvidenceMachine,
    catalog: CatalogState,
    diagnostics: DiagnosticSink,
}

impl<T, S> SessionController<T, S>
where
    T: ServiceTransport + ?Sized,
    S: KeyValueStore,
{
    pub fn new(transport: Arc<T>, store: S, candidates: Vec<String>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            candidates,
            policy,
            store: SessionStore::new(store),
            machine: EvidenceMachine::default(),
            catalog: CatalogState::Unresolved,
            diagnostics: DiagnosticSink::default(),
        }
    }

    pub fn state(&self) -> &SessionState {
        self.store.get()
    }

    pub fn catalog(&self) -> &CatalogState {
        &self.catalog
    }

    pub fn diagnostic(&self) -> Option<AttemptFailure> {
        self.diagnostics.current()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let catalog = match &self.catalog {
            CatalogState::Unresolved => catalog_status("unresolved", None, &[], None),
            CatalogState::Resolving => catalog_status("resolving", None, &[], None),
            CatalogState::Ready { base, networks } => {
                catalog_status("ready", Some(base.clone()), networks, None)
            }
            CatalogState::Failed { message } => {
                catalog_status("failed", None, &[], Some(message.clone()))
            }
        };
        SessionSnapshot {
            state: self.state().clone(),
            catalog,
            diagnostic: self.diagnostic(),
            controls: ControlsView::from_state(self.state()),
        }
    }

    /// Resolves the service and restores the session, holding `self` for the whole call.
    pub fn connect<P: Presenter>(&mut self, out: &mut P) -> Result<(), ControllerError> {
        match self.begin_connect(out)? {
            Some(pending) => {
                let run = pending.execute();
                self.complete_connect(run, out)
            }
            None => Ok(()),
        }
    }

    /// `None` when a catalog is already loaded; its view is replayed instead.
    pub fn begin_connect<P: Presenter>(
        &mut self,
        out: &mut P,
    ) -> Result<Option<PendingResolve<T>>, ControllerError> {
        match &self.catalog {
            CatalogState::Resolving => return Err(ControllerError::Resolving),
            CatalogState::Ready { .. } => {
                self.replay(out);
                return Ok(None);
            }
            CatalogState::Unresolved | CatalogState::Failed { .. } => {}
        }
        self.catalog = CatalogState::Resolving;
        Ok(Some(PendingResolve {
            transport: Arc::clone(&self.transport),
            candidates: self.candidates.clone(),
            policy: self.policy,
            diagnostics: self.diagnostics.clone(),
        }))
    }

    pub fn complete_connect<P: Presenter>(
        &mut self,
        run: ResolveRun,
        out: &mut P,
    ) -> Result<(), ControllerError> {
        for status in run.statuses {
            let status = match status {
                ResolveStatus::AttemptFailed(failure) => Some(failure),
                ResolveStatus::Cleared => None,
            };
            out.present(PresentationEvent::Diagnostic { status });
        }

        let resolved = match run.result {
            Ok(resolved) => resolved,
            Err(err) => {
                let message = err.to_string();
                log::warn!("endpoint resolution failed: {message}");
                self.catalog = CatalogState::Failed {
                    message: message.clone(),
                };
                out.present(PresentationEvent::CatalogError { message });
                return Err(err.into());
            }
        };

        let base_state = self
            .store
            .restore()
            .unwrap_or_else(|| self.store.get().clone());
        let state = base_state.reconcile_with_catalog(&resolved.catalog);
        self.store.replace(state);
        self.catalog = CatalogState::Ready {
            base: resolved.base,
            networks: resolved.catalog,
        };

        let networks = self.network_names();
        out.present(PresentationEvent::CatalogLoaded {
            networks,
            selected: self.state().network_name.clone(),
        });
        let evidence = self.state().evidence.clone();
        if self.load_network_view(out) {
            let effects = self.machine.restore(&evidence);
            self.apply_effects(effects, out);
        }
        out.present(PresentationEvent::controls(self.state()));
        self.sync_and_persist();
        Ok(())
    }

    pub fn select_network<P: Presenter>(
        &mut self,
        name: &str,
        out: &mut P,
    ) -> Result<(), ControllerError> {
        let network = self.find_network(name)?;
        let network_name = network.name.clone();
        let query = network.default_query_variable().map(str::to_string);
        self.store.set(SessionPatch {
            network_name: Some(Some(network_name)),
            query_variable: Some(query),
            evidence: Some(Default::default()),
            ..SessionPatch::default()
        });
        self.load_network_view(out);
        self.sync_and_persist();
        Ok(())
    }

    pub fn select_query<P: Presenter>(
        &mut self,
        variable: &str,
        out: &mut P,
    ) -> Result<(), ControllerError> {
        let network = self.active_network()?;
        if !network.has_variable(variable) {
            return Err(ControllerError::UnknownVariable(variable.to_string()));
        }
        let effects = self.machine.select_query(variable)?;
        self.store.set(SessionPatch {
            query_variable: Some(Some(variable.to_string())),
            ..SessionPatch::default()
        });
        self.apply_effects(effects, out);
        Ok(())
    }

    /// Advances a node through its evidence cycle. Clicking the query variable only
    /// produces a notice.
    pub fn toggle_evidence<P: Presenter>(
        &mut self,
        node: &str,
        out: &mut P,
    ) -> Result<(), ControllerError> {
        self.active_network()?;
        match self.machine.activate(node) {
            Ok(effects) => {
                self.apply_effects(effects, out);
                Ok(())
            }
            Err(rejection @ EvidenceRejection::QueryVariable(_)) => {
                out.present(PresentationEvent::Notice {
                    level: NoticeLevel::Warning,
                    message: rejection.to_string(),
                });
                Ok(())
            }
            Err(rejection) => Err(rejection.into()),
        }
    }

    pub fn set_algorithm<P: Presenter>(
        &mut self,
        algorithm: Algorithm,
        out: &mut P,
    ) -> Result<(), ControllerError> {
        self.ensure_restored()?;
        if self.state().compare_enabled {
            return Err(ControllerError::AlgorithmLocked);
        }
        self.update_controls(
            SessionPatch {
                algorithm: Some(algorithm),
                ..SessionPatch::default()
            },
            out,
        );
        Ok(())
    }

    pub fn set_sample_count<P: Presenter>(
        &mut self,
        samples: u32,
        out: &mut P,
    ) -> Result<(), ControllerError> {
        self.ensure_restored()?;
        if samples == 0 {
            return Err(ControllerError::InvalidSampleCount);
        }
        self.update_controls(
            SessionPatch {
                sample_count: Some(samples),
                ..SessionPatch::default()
            },
            out,
        );
        Ok(())
    }

    pub fn set_compare_enabled<P: Presenter>(
        &mut self,
        enabled: bool,
        out: &mut P,
    ) -> Result<(), ControllerError> {
        self.ensure_restored()?;
        let was_enabled = self.state().compare_enabled;
        self.update_controls(
            SessionPatch {
                compare_enabled: Some(enabled),
                ..SessionPatch::default()
            },
            out,
        );
        if was_enabled && !enabled {
            out.present(PresentationEvent::CompareChartCleared);
        }
        Ok(())
    }

    pub fn set_compare_mode<P: Presenter>(
        &mut self,
        mode: CompareDisplayMode,
        out: &mut P,
    ) -> Result<(), ControllerError> {
        self.ensure_restored()?;
        self.update_controls(
            SessionPatch {
                compare_display_mode: Some(mode),
                ..SessionPatch::default()
            },
            out,
        );
        Ok(())
    }

    pub fn network_info(&self) -> Result<NetworkStats, ControllerError> {
        Ok(self.active_network()?.stats())
    }

    /// Runs the current query end to end while holding `self`.
    pub fn run_inference<P: Presenter>(&mut self, out: &mut P) -> Result<(), ControllerError> {
        let Some(pending) = self.begin_run(out)? else {
            return Ok(());
        };
        let outcome = pending.execute();
        self.complete_run(pending.compare(), outcome, out)
    }

    /// Snapshots the request. `None` when there is nothing to ask yet.
    pub fn begin_run<P: Presenter>(
        &mut self,
        out: &mut P,
    ) -> Result<Option<PendingRun<T>>, ControllerError> {
        let CatalogState::Ready { base, .. } = &self.catalog else {
            return Err(ControllerError::NotConnected);
        };
        let state = self.state().clone();
        if state.network_name.is_none() || state.query_variable.is_none() {
            return Ok(None);
        }
        out.present(PresentationEvent::RunState {
            running: true,
            compare: state.compare_enabled,
        });
        Ok(Some(PendingRun {
            transport: Arc::clone(&self.transport),
            base: base.clone(),
            state,
        }))
    }

    pub fn complete_run<P: Presenter>(
        &mut self,
        compare: bool,
        outcome: Result<Option<InferenceOutcome>, InferenceError>,
        out: &mut P,
    ) -> Result<(), ControllerError> {
        let result = match outcome {
            Ok(Some(InferenceOutcome::Single { algorithm, result })) => {
                out.present(PresentationEvent::SingleResult {
                    algorithm,
                    view: result.view(),
                    series: result.series(None),
                });
                Ok(())
            }
            Ok(Some(InferenceOutcome::Compare { ve, gibbs })) => {
                out.present(PresentationEvent::CompareResult {
                    ve: ve.view(),
                    gibbs: gibbs.view(),
                    series: vec![ve.series(Some("VE")), gibbs.series(Some("Gibbs"))],
                });
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                out.present(PresentationEvent::Notice {
                    level: NoticeLevel::Error,
                    message: err.user_message(),
                });
                Err(err.into())
            }
        };
        out.present(PresentationEvent::RunState {
            running: false,
            compare,
        });
        result
    }

    fn replay<P: Presenter>(&self, out: &mut P) {
        out.present(PresentationEvent::Diagnostic {
            status: self.diagnostic(),
        });
        out.present(PresentationEvent::CatalogLoaded {
            networks: self.network_names(),
            selected: self.state().network_name.clone(),
        });
        if let Ok(network) = self.active_network() {
            emit_network(network, self.state(), out);
            for node in &network.nodes {
                out.present(PresentationEvent::NodeVisual {
                    node: node.clone(),
                    state: self.machine.state_of(node).into(),
                });
            }
            out.present(PresentationEvent::summary(self.machine.observed()));
        }
        out.present(PresentationEvent::controls(self.state()));
    }

    /// Resets the evidence machine to the active network and emits its graph. Returns
    /// whether a network is active.
    fn load_network_view<P: Presenter>(&mut self, out: &mut P) -> bool {
        let Some(network) = self.active_network().ok().cloned() else {
            self.machine = EvidenceMachine::default();
            return false;
        };
        emit_network(&network, self.state(), out);
        let query = self.state().query_variable.clone();
        let effects = self.machine.reset(network.nodes.clone(), query);
        for effect in effects {
            self.present_effect(effect, out);
        }
        true
    }

    fn apply_effects<P: Presenter>(&mut self, effects: Vec<EvidenceEffect>, out: &mut P) {
        let mut persist = false;
        for effect in effects {
            persist |= self.present_effect(effect, out);
        }
        if persist {
            self.sync_and_persist();
        }
    }

    /// Returns `true` for persistence requests, which the caller batches.
    fn present_effect<P: Presenter>(&self, effect: EvidenceEffect, out: &mut P) -> bool {
        match effect {
            EvidenceEffect::NodeVisual { node, state } => {
                out.present(PresentationEvent::NodeVisual {
                    node,
                    state: state.into(),
                });
                false
            }
            EvidenceEffect::Summary(observed) => {
                out.present(PresentationEvent::summary(observed));
                false
            }
            EvidenceEffect::Persist => true,
        }
    }

    fn update_controls<P: Presenter>(&mut self, patch: SessionPatch, out: &mut P) {
        let state = self.store.set(patch);
        self.persist();
        out.present(PresentationEvent::controls(&state));
    }

    fn sync_and_persist(&mut self) {
        self.store.set(SessionPatch {
            evidence: Some(self.machine.assignment()),
            ..SessionPatch::default()
        });
        self.persist();
    }

    fn persist(&self) {
        if let Err(err) = self.store.persist() {
            log::warn!("session persist failed: {err}");
        }
    }

    /// The in-memory state only mirrors the stored record once a catalog is loaded;
    /// writing earlier would replace that record with defaults.
    fn ensure_restored(&self) -> Result<(), ControllerError> {
        match self.catalog {
            CatalogState::Ready { .. } => Ok(()),
            _ => Err(ControllerError::NotConnected),
        }
    }

    fn network_names(&self) -> Vec<String> {
        match &self.catalog {
            CatalogState::Ready { networks, .. } => {
                networks.iter().map(|n| n.name.clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    fn find_network(&self, name: &str) -> Result<&NetworkDescriptor, ControllerError> {
        let CatalogState::Ready { networks, .. } = &self.catalog else {
            return Err(ControllerError::NotConnected);
        };
        networks
            .iter()
            .find(|n| n.name == name)
            .ok_or_else(|| ControllerError::UnknownNetwork(name.to_string()))
    }

    fn active_network(&self) -> Result<&NetworkDescriptor, ControllerError> {
        let name = self
            .state()
            .network_name
            .as_deref()
            .ok_or(ControllerError::NotConnected)?;
        self.find_network(name)
    }
}

fn emit_network<P: Presenter>(network: &NetworkDescriptor, state: &SessionState, out: &mut P) {
    out.present(PresentationEvent::GraphLoaded {
        network: network.name.clone(),
        nodes: network.nodes.clone(),
        edges: network.edges.clone(),
    });
    out.present(PresentationEvent::QueryOptions {
        variables: network.variables.clone(),
        selected: state.query_variable.clone(),
    });
    out.present(PresentationEvent::NetworkInfo {
        stats: network.stats(),
    });
}

fn catalog_status(
    status: &'static str,
    base: Option<String>,
    networks: &[NetworkDescriptor],
    error: Option<String>,
) -> CatalogStatus {
    CatalogStatus {
        status,
        base,
        networks: networks.iter().map(|n| n.name.clone()).collect(),
        error,
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
