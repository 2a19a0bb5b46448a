use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::evidence::EvidenceAssignment;
use crate::session::{Algorithm, SessionState};

const STATE_FALSE: &str = "0";
const STATE_TRUE: &str = "1";
const CHART_LABELS: [&str; 2] = ["FALSE (0)", "TRUE (1)"];

/// Body of `POST {base}/inference`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub network: String,
    pub algorithm: Algorithm,
    pub query_var: String,
    pub evidence: EvidenceAssignment,
    pub samples: u32,
}

impl InferenceRequest {
    /// Builds the request for `algorithm`, or `None` while no network or query variable is chosen.
    pub fn from_session(state: &SessionState, algorithm: Algorithm) -> Option<Self> {
        let network = state.network_name.clone()?;
        let query_var = state.query_variable.clone()?;
        Some(Self {
            network,
            algorithm,
            query_var,
            evidence: state.evidence.clone(),
            samples: state.sample_count,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub probabilities: BTreeMap<String, f64>,
    #[serde(default)]
    pub time_ms: f64,
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub samples: Option<u64>,
}

impl InferenceResult {
    pub fn probability(&self, state: &str) -> f64 {
        self.probabilities.get(state).copied().unwrap_or(0.0)
    }

    pub fn view(&self) -> DistributionView {
        DistributionView::from_result(self)
    }

    pub fn series(&self, name: Option<&str>) -> ChartSeries {
        ChartSeries {
            name: name.map(str::to_string),
            labels: CHART_LABELS.map(str::to_string),
            values: [self.probability(STATE_FALSE), self.probability(STATE_TRUE)],
        }
    }
}

/// Display-ready numbers for one result card.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionView {
    pub p_false: f64,
    pub p_true: f64,
    pub time_ms: f64,
    pub p_false_text: String,
    pub p_true_text: String,
    pub latency_text: String,
}

impl DistributionView {
    pub fn from_result(result: &InferenceResult) -> Self {
        let p_false = result.probability(STATE_FALSE);
        let p_true = result.probability(STATE_TRUE);
        Self {
            p_false,
            p_true,
            time_ms: result.time_ms,
            p_false_text: format!("{p_false:.4}"),
            p_true_text: format!("{p_true:.4}"),
            latency_text: format!("{:.2} ms", result.time_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub name: Option<String>,
    pub labels: [String; 2],
    pub values: [f64; 2],
}
