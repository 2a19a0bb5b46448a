use bnlab_core::evidence::{NodeEvidence, ObservedNode};
use bnlab_core::inference::{ChartSeries, DistributionView};
use bnlab_core::network::NetworkStats;
use bnlab_core::session::{Algorithm, CompareDisplayMode, SessionState};
use serde::Serialize;

use crate::endpoint::AttemptFailure;

pub(crate) const EMPTY_EVIDENCE_HINT: &str =
    "No nodes observed. Click the graph to set observations.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeVisualState {
    Unobserved,
    ObservedTrue,
    ObservedFalse,
}

impl From<NodeEvidence> for NodeVisualState {
    fn from(value: NodeEvidence) -> Self {
        match value {
            NodeEvidence::Unobserved => NodeVisualState::Unobserved,
            NodeEvidence::True => NodeVisualState::ObservedTrue,
            NodeEvidence::False => NodeVisualState::ObservedFalse,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// Visibility and values of the run controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlsView {
    pub algorithm: Algorithm,
    pub algorithm_locked: bool,
    pub sample_count: u32,
    pub show_sample_settings: bool,
    pub compare_enabled: bool,
    pub compare_display_mode: CompareDisplayMode,
    pub show_compare_cards: bool,
    pub show_compare_chart: bool,
}

impl ControlsView {
    pub fn from_state(state: &SessionState) -> Self {
        let compare = state.compare_enabled;
        Self {
            algorithm: state.algorithm,
            algorithm_locked: compare,
            sample_count: state.sample_count,
            show_sample_settings: compare || state.algorithm == Algorithm::Gibbs,
            compare_enabled: compare,
            compare_display_mode: state.compare_display_mode,
            show_compare_cards: compare && state.compare_display_mode.shows_cards(),
            show_compare_chart: compare && state.compare_display_mode.shows_chart(),
        }
    }
}

/// Everything the client has to redraw, in the order it has to be applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PresentationEvent {
    CatalogLoaded {
        networks: Vec<String>,
        selected: Option<String>,
    },
    CatalogError {
        message: String,
    },
    Diagnostic {
        status: Option<AttemptFailure>,
    },
    GraphLoaded {
        network: String,
        nodes: Vec<String>,
        edges: Vec<(String, String)>,
    },
    QueryOptions {
        variables: Vec<String>,
        selected: Option<String>,
    },
    NodeVisual {
        node: String,
        state: NodeVisualState,
    },
    EvidenceSummary {
        observed: Vec<ObservedNode>,
        hint: Option<String>,
    },
    NetworkInfo {
        stats: NetworkStats,
    },
    ControlsChanged {
        controls: ControlsView,
    },
    RunState {
        running: bool,
        compare: bool,
    },
    SingleResult {
        algorithm: Algorithm,
        view: DistributionView,
        series: ChartSeries,
    },
    CompareResult {
        ve: DistributionView,
        gibbs: DistributionView,
        series: Vec<ChartSeries>,
    },
    CompareChartCleared,
    Notice {
        level: NoticeLevel,
        message: String,
    },
}

impl PresentationEvent {
    pub(crate) fn summary(observed: Vec<ObservedNode>) -> Self {
        let hint = observed
            .is_empty()
            .then(|| EMPTY_EVIDENCE_HINT.to_string());
        PresentationEvent::EvidenceSummary { observed, hint }
    }

    pub(crate) fn controls(state: &SessionState) -> Self {
        PresentationEvent::ControlsChanged {
            controls: ControlsView::from_state(state),
        }
    }
}

/// Sink for controller output.
pub trait Presenter {
    fn present(&mut self, event: PresentationEvent);
}

impl Presenter for Vec<PresentationEvent> {
    fn present(&mut self, event: PresentationEvent) {
        self.push(event);
    }
}
