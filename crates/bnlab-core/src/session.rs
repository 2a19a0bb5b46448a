use serde::{Deserialize, Serialize};
use std::fmt;

use crate::evidence::{EvidenceAssignment, NodeEvidence};
use crate::network::NetworkDescriptor;

/// Fixed key of the persisted session record.
pub const SESSION_STATE_KEY: &str = "bnlab.session.v1";
pub const DEFAULT_SAMPLE_COUNT: u32 = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Ve,
    Gibbs,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Ve => "ve",
            Algorithm::Gibbs => "gibbs",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ve" => Some(Algorithm::Ve),
            "gibbs" => Some(Algorithm::Gibbs),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareDisplayMode {
    Cards,
    Chart,
    #[default]
    Both,
}

impl CompareDisplayMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cards" => Some(CompareDisplayMode::Cards),
            "chart" => Some(CompareDisplayMode::Chart),
            "both" => Some(CompareDisplayMode::Both),
            _ => None,
        }
    }

    pub fn shows_cards(self) -> bool {
        matches!(self, CompareDisplayMode::Cards | CompareDisplayMode::Both)
    }

    pub fn shows_chart(self) -> bool {
        matches!(self, CompareDisplayMode::Chart | CompareDisplayMode::Both)
    }
}

fn default_sample_count() -> u32 {
    DEFAULT_SAMPLE_COUNT
}

/// Serializable snapshot of everything the user has chosen in this session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub network_name: Option<String>,
    #[serde(default)]
    pub query_variable: Option<String>,
    #[serde(default)]
    pub evidence: EvidenceAssignment,
    #[serde(default)]
    pub algorithm: Algorithm,
    #[serde(default = "default_sample_count", alias = "samples")]
    pub sample_count: u32,
    #[serde(default)]
    pub compare_enabled: bool,
    #[serde(default)]
    pub compare_display_mode: CompareDisplayMode,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            network_name: None,
            query_variable: None,
            evidence: EvidenceAssignment::new(),
            algorithm: Algorithm::default(),
            sample_count: DEFAULT_SAMPLE_COUNT,
            compare_enabled: false,
            compare_display_mode: CompareDisplayMode::default(),
        }
    }
}

impl SessionState {
    /// Structural checks for a decoded record. Anything failing here is treated as malformed.
    pub fn check_structure(&self) -> Result<(), String> {
        if self.sample_count == 0 {
            return Err("sampleCount must be positive".to_string());
        }
        if let Some((node, value)) = self
            .evidence
            .iter()
            .find(|(_, value)| NodeEvidence::from_value(**value).is_none())
        {
            return Err(format!("evidence {node} has non-binary value {value}"));
        }
        Ok(())
    }

    /// Drops selections that no longer make sense against a freshly fetched catalog and
    /// fills in the default network and query variable.
    pub fn reconcile_with_catalog(mut self, catalog: &[NetworkDescriptor]) -> Self {
        let network = self
            .network_name
            .as_deref()
            .and_then(|name| catalog.iter().find(|n| n.name == name));
        let network = match network {
            Some(network) => network,
            None => {
                if let Some(stale) = self.network_name.take() {
                    log::info!("restored network {stale} is no longer served; using default");
                }
                self.query_variable = None;
                self.evidence.clear();
                match catalog.first() {
                    Some(first) => first,
                    None => return self,
                }
            }
        };
        self.network_name = Some(network.name.clone());

        let query_ok = self
            .query_variable
            .as_deref()
            .map(|q| network.has_variable(q))
            .unwrap_or(false);
        if !query_ok {
            self.query_variable = network.default_query_variable().map(str::to_string);
        }

        let query = self.query_variable.clone();
        self.evidence
            .retain(|node, _| network.has_node(node) && query.as_deref() != Some(node.as_str()));
        self
    }
}

/// Partial update for [`SessionStore::set`]. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub network_name: Option<Option<String>>,
    pub query_variable: Option<Option<String>>,
    pub evidence: Option<EvidenceAssignment>,
    pub algorithm: Option<Algorithm>,
    pub sample_count: Option<u32>,
    pub compare_enabled: Option<bool>,
    pub compare_display_mode: Option<CompareDisplayMode>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable string substrate the session record is written to.
pub trait KeyValueStore {
    fn read_value(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn write_value(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

pub struct SessionStore<S> {
    state: SessionState,
    substrate: S,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(substrate: S) -> Self {
        Self {
            state: SessionState::default(),
            substrate,
        }
    }

    pub fn get(&self) -> &SessionState {
        &self.state
    }

    pub fn substrate(&self) -> &S {
        &self.substrate
    }

    pub fn set(&mut self, patch: SessionPatch) -> SessionState {
        let state = &mut self.state;
        if let Some(network_name) = patch.network_name {
            state.network_name = network_name;
        }
        if let Some(query_variable) = patch.query_variable {
            state.query_variable = query_variable;
        }
        if let Some(evidence) = patch.evidence {
            state.evidence = evidence;
        }
        if let Some(algorithm) = patch.algorithm {
            state.algorithm = algorithm;
        }
        if let Some(sample_count) = patch.sample_count {
            state.sample_count = sample_count;
        }
        if let Some(compare_enabled) = patch.compare_enabled {
            state.compare_enabled = compare_enabled;
        }
        if let Some(mode) = patch.compare_display_mode {
            state.compare_display_mode = mode;
        }
        state.clone()
    }

    pub fn replace(&mut self, state: SessionState) {
        self.state = state;
    }

    pub fn persist(&self) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&self.state)?;
        self.substrate.write_value(SESSION_STATE_KEY, &raw)
    }

    /// Reads the stored record. Missing, unreadable or malformed records yield `None`.
    pub fn restore(&self) -> Option<SessionState> {
        let raw = match self.substrate.read_value(SESSION_STATE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                log::warn!("session restore skipped: {err}");
                return None;
            }
        };
        let state: SessionState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(err) => {
                log::warn!("discarding malformed session record: {err}");
                return None;
            }
        };
        if let Err(reason) = state.check_structure() {
            log::warn!("discarding malformed session record: {reason}");
            return None;
        }
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryKv(RefCell<HashMap<String, String>>);

    impl KeyValueStore for MemoryKv {
        fn read_value(&self, key: &str) -> Result<Option<String>, StoreError> {
            Ok(self.0.borrow().get(key).cloned())
        }

        fn write_value(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.0.borrow_mut().insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    fn network(name: &str, nodes: &[&str]) -> NetworkDescriptor {
        let nodes: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
        NetworkDescriptor {
            name: name.to_string(),
            nodes: nodes.clone(),
            edges: Vec::new(),
            variables: nodes,
            cpt_sizes: Vec::new(),
            state_counts: Vec::new(),
            total_cpt_entries: None,
        }
    }

    fn saved_state() -> SessionState {
        SessionState {
            network_name: Some("N1".to_string()),
            query_variable: Some("B".to_string()),
            evidence: EvidenceAssignment::from([("A".to_string(), 1)]),
            algorithm: Algorithm::Gibbs,
            sample_count: 500,
            compare_enabled: true,
            compare_display_mode: CompareDisplayMode::Both,
        }
    }

    #[test]
    fn persisted_state_roundtrips_against_same_catalog() {
        let mut store = SessionStore::new(MemoryKv::default());
        store.replace(saved_state());
        store.persist().expect("persist");

        let restored = store.restore().expect("restored");
        assert_eq!(restored, saved_state());
        let catalog = vec![network("N1", &["A", "B"])];
        assert_eq!(restored.reconcile_with_catalog(&catalog), saved_state());
    }

    #[test]
    fn restore_drops_fields_of_missing_network() {
        let mut store = SessionStore::new(MemoryKv::default());
        store.replace(saved_state());
        store.persist().expect("persist");

        let catalog = vec![network("N2", &["X", "Y"])];
        let restored = store
            .restore()
            .expect("restored")
            .reconcile_with_catalog(&catalog);
        assert_eq!(restored.network_name.as_deref(), Some("N2"));
        assert_eq!(restored.query_variable.as_deref(), Some("X"));
        assert!(restored.evidence.is_empty());
        assert_eq!(restored.algorithm, Algorithm::Gibbs);
        assert_eq!(restored.sample_count, 500);
        assert!(restored.compare_enabled);
        assert_eq!(restored.compare_display_mode, CompareDisplayMode::Both);
    }

    #[test]
    fn restore_accepts_samples_alias() {
        let kv = MemoryKv::default();
        kv.write_value(
            SESSION_STATE_KEY,
            r#"{"networkName":"N1","algorithm":"gibbs","evidence":{"A":1},"samples":500,"compareEnabled":true,"compareDisplayMode":"both"}"#,
        )
        .expect("seed");
        let restored = SessionStore::new(kv).restore().expect("restored");
        assert_eq!(restored.sample_count, 500);
        assert_eq!(restored.evidence.get("A"), Some(&1));
    }

    #[test]
    fn malformed_records_are_ignored() {
        for raw in [
            "not json",
            r#"{"sampleCount":0}"#,
            r#"{"evidence":{"A":3}}"#,
            r#"{"algorithm":"bogus"}"#,
        ] {
            let kv = MemoryKv::default();
            kv.write_value(SESSION_STATE_KEY, raw).expect("seed");
            assert!(SessionStore::new(kv).restore().is_none(), "accepted {raw}");
        }
    }

    #[test]
    fn restore_without_record_is_absent() {
        assert!(SessionStore::new(MemoryKv::default()).restore().is_none());
    }

    #[test]
    fn set_merges_only_given_fields() {
        let mut store = SessionStore::new(MemoryKv::default());
        let next = store.set(SessionPatch {
            algorithm: Some(Algorithm::Gibbs),
            sample_count: Some(250),
            ..SessionPatch::default()
        });
        assert_eq!(next.algorithm, Algorithm::Gibbs);
        assert_eq!(next.sample_count, 250);
        assert!(!next.compare_enabled);
        assert_eq!(store.get(), &next);
    }

    #[test]
    fn reconcile_drops_evidence_on_query_and_unknown_nodes() {
        let mut state = saved_state();
        state.evidence.insert("B".to_string(), 0);
        state.evidence.insert("ghost".to_string(), 1);
        let reconciled = state.reconcile_with_catalog(&[network("N1", &["A", "B"])]);
        assert_eq!(
            reconciled.evidence,
            EvidenceAssignment::from([("A".to_string(), 1)])
        );
    }

    #[test]
    fn reconcile_with_empty_catalog_clears_network_fields() {
        let reconciled = saved_state().reconcile_with_catalog(&[]);
        assert!(reconciled.network_name.is_none());
        assert!(reconciled.query_variable.is_none());
        assert!(reconciled.evidence.is_empty());
    }
}
