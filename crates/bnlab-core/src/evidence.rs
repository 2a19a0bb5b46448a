use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Observed value of a single node. Absence from the assignment means unobserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeEvidence {
    #[default]
    Unobserved,
    True,
    False,
}

impl NodeEvidence {
    /// One activation step of the tri-state cycle.
    pub fn next(self) -> Self {
        match self {
            NodeEvidence::Unobserved => NodeEvidence::True,
            NodeEvidence::True => NodeEvidence::False,
            NodeEvidence::False => NodeEvidence::Unobserved,
        }
    }

    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(NodeEvidence::True),
            0 => Some(NodeEvidence::False),
            _ => None,
        }
    }

    pub fn value(self) -> Option<u8> {
        match self {
            NodeEvidence::Unobserved => None,
            NodeEvidence::True => Some(1),
            NodeEvidence::False => Some(0),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NodeEvidence::Unobserved => "UNOBSERVED",
            NodeEvidence::True => "TRUE",
            NodeEvidence::False => "FALSE",
        }
    }
}

/// Node name to binary observed value, as sent in the `evidence` field of an inference request.
pub type EvidenceAssignment = BTreeMap<String, u8>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedNode {
    pub node: String,
    pub value: NodeEvidence,
}

/// Side effects requested by a transition. The machine never applies them itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvidenceEffect {
    NodeVisual { node: String, state: NodeEvidence },
    Summary(Vec<ObservedNode>),
    Persist,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvidenceRejection {
    #[error("Cannot set evidence on the target variable!")]
    QueryVariable(String),
    #[error("unknown node: {0}")]
    UnknownNode(String),
}

/// Tri-state evidence for the nodes of the active network plus the query variable guard.
#[derive(Debug, Clone, Default)]
pub struct EvidenceMachine {
    nodes: Vec<String>,
    query: Option<String>,
    evidence: BTreeMap<String, NodeEvidence>,
}

impl EvidenceMachine {
    pub fn new(nodes: Vec<String>, query: Option<String>) -> Self {
        Self {
            nodes,
            query,
            evidence: BTreeMap::new(),
        }
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn state_of(&self, node: &str) -> NodeEvidence {
        self.evidence.get(node).copied().unwrap_or_default()
    }

    pub fn assignment(&self) -> EvidenceAssignment {
        self.evidence
            .iter()
            .filter_map(|(node, state)| state.value().map(|value| (node.clone(), value)))
            .collect()
    }

    pub fn observed(&self) -> Vec<ObservedNode> {
        self.evidence
            .iter()
            .filter(|(_, state)| **state != NodeEvidence::Unobserved)
            .map(|(node, state)| ObservedNode {
                node: node.clone(),
                value: *state,
            })
            .collect()
    }

    /// Advances `node` one step through the cycle. The query variable is refused.
    pub fn activate(&mut self, node: &str) -> Result<Vec<EvidenceEffect>, EvidenceRejection> {
        if self.query.as_deref() == Some(node) {
            return Err(EvidenceRejection::QueryVariable(node.to_string()));
        }
        if !self.knows(node) {
            return Err(EvidenceRejection::UnknownNode(node.to_string()));
        }
        let next = self.state_of(node).next();
        self.set_state(node, next);
        Ok(vec![
            EvidenceEffect::NodeVisual {
                node: node.to_string(),
                state: next,
            },
            EvidenceEffect::Summary(self.observed()),
            EvidenceEffect::Persist,
        ])
    }

    /// Makes `node` the query variable, clearing any evidence it held first.
    pub fn select_query(&mut self, node: &str) -> Result<Vec<EvidenceEffect>, EvidenceRejection> {
        if !self.knows(node) {
            return Err(EvidenceRejection::UnknownNode(node.to_string()));
        }
        let mut effects = Vec::new();
        if self.evidence.remove(node).is_some() {
            effects.push(EvidenceEffect::NodeVisual {
                node: node.to_string(),
                state: NodeEvidence::Unobserved,
            });
            effects.push(EvidenceEffect::Summary(self.observed()));
        }
        self.query = Some(node.to_string());
        effects.push(EvidenceEffect::Persist);
        Ok(effects)
    }

    /// Switches to a new node set; every node starts unobserved.
    pub fn reset(&mut self, nodes: Vec<String>, query: Option<String>) -> Vec<EvidenceEffect> {
        self.nodes = nodes;
        self.query = query;
        self.evidence.clear();
        let mut effects: Vec<EvidenceEffect> = self
            .nodes
            .iter()
            .map(|node| EvidenceEffect::NodeVisual {
                node: node.clone(),
                state: NodeEvidence::Unobserved,
            })
            .collect();
        effects.push(EvidenceEffect::Summary(Vec::new()));
        effects.push(EvidenceEffect::Persist);
        effects
    }

    /// Reapplies a persisted assignment. Unknown nodes, the query variable and
    /// values outside {0, 1} are skipped.
    pub fn restore(&mut self, assignment: &EvidenceAssignment) -> Vec<EvidenceEffect> {
        let mut effects = Vec::new();
        for (node, value) in assignment {
            if self.query.as_deref() == Some(node.as_str()) || !self.knows(node) {
                log::debug!("skipping restored evidence for {node}");
                continue;
            }
            let Some(state) = NodeEvidence::from_value(*value) else {
                log::debug!("skipping restored evidence value {value} for {node}");
                continue;
            };
            self.set_state(node, state);
            effects.push(EvidenceEffect::NodeVisual {
                node: node.clone(),
                state,
            });
        }
        effects.push(EvidenceEffect::Summary(self.observed()));
        effects
    }

    fn knows(&self, node: &str) -> bool {
        self.nodes.iter().any(|n| n == node)
    }

    fn set_state(&mut self, node: &str, state: NodeEvidence) {
        if state == NodeEvidence::Unobserved {
            self.evidence.remove(node);
        } else {
            self.evidence.insert(node.to_string(), state);
        }
    }
}
