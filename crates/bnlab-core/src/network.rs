use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const VARIABLES_PREVIEW_LEN: usize = 10;
const LARGEST_CPT_COUNT: usize = 3;
const STATE_COUNT_PREVIEW_LEN: usize = 6;

/// Per-node counts in the order the service listed them.
pub type NodeCounts = Vec<(String, u64)>;

/// Structural description of one network as served by `GET {base}/networks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DescriptorWire")]
pub struct NetworkDescriptor {
    pub name: String,
    pub nodes: Vec<String>,
    pub edges: Vec<(String, String)>,
    pub variables: Vec<String>,
    #[serde(with = "ordered_counts")]
    pub cpt_sizes: NodeCounts,
    #[serde(with = "ordered_counts")]
    pub state_counts: NodeCounts,
    pub total_cpt_entries: Option<u64>,
}

#[derive(Deserialize)]
struct DescriptorWire {
    name: String,
    nodes: Vec<String>,
    #[serde(default)]
    edges: Vec<(String, String)>,
    #[serde(default)]
    variables: Option<Vec<String>>,
    #[serde(default, with = "ordered_counts")]
    cpt_sizes: NodeCounts,
    #[serde(default, with = "ordered_counts")]
    state_counts: NodeCounts,
    #[serde(default)]
    total_cpt_entries: Option<u64>,
}

impl From<DescriptorWire> for NetworkDescriptor {
    fn from(wire: DescriptorWire) -> Self {
        // Every node is queryable unless the service narrows the list.
        let variables = wire.variables.unwrap_or_else(|| wire.nodes.clone());
        Self {
            name: wire.name,
            nodes: wire.nodes,
            edges: wire.edges,
            variables,
            cpt_sizes: wire.cpt_sizes,
            state_counts: wire.state_counts,
            total_cpt_entries: wire.total_cpt_entries,
        }
    }
}

/// JSON objects read and written as ordered pairs, keeping document order.
mod ordered_counts {
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    use super::NodeCounts;

    pub fn serialize<S: Serializer>(counts: &NodeCounts, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(counts.len()))?;
        for (node, count) in counts {
            map.serialize_entry(node, count)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NodeCounts, D::Error> {
        deserializer.deserialize_map(CountsVisitor)
    }

    struct CountsVisitor;

    impl<'de> Visitor<'de> for CountsVisitor {
        type Value = NodeCounts;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object of per-node counts")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<NodeCounts, A::Error> {
            let mut counts = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((node, count)) = access.next_entry::<String, u64>()? {
                counts.push((node, count));
            }
            Ok(counts)
        }
    }
}

impl NetworkDescriptor {
    /// Checks that every edge endpoint and every query-eligible variable is a declared node.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("network name is empty".to_string());
        }
        let known: HashSet<&str> = self.nodes.iter().map(String::as_str).collect();
        for (from, to) in &self.edges {
            for endpoint in [from, to] {
                if !known.contains(endpoint.as_str()) {
                    return Err(format!(
                        "network {}: edge {from}->{to} references unknown node {endpoint}",
                        self.name
                    ));
                }
            }
        }
        if let Some(unknown) = self
            .variables
            .iter()
            .find(|v| !known.contains(v.as_str()))
        {
            return Err(format!(
                "network {}: variable {unknown} is not a node",
                self.name
            ));
        }
        Ok(())
    }

    pub fn has_node(&self, node: &str) -> bool {
        self.nodes.iter().any(|n| n == node)
    }

    pub fn has_variable(&self, variable: &str) -> bool {
        self.variables.iter().any(|v| v == variable)
    }

    pub fn default_query_variable(&self) -> Option<&str> {
        self.variables.first().map(String::as_str)
    }

    /// Uses the served total when present, otherwise sums the per-node CPT sizes.
    pub fn total_cpt_entries(&self) -> u64 {
        self.total_cpt_entries
            .unwrap_or_else(|| self.cpt_sizes.iter().map(|(_, size)| size).sum())
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats::from_descriptor(self)
    }
}

/// Drops descriptors that break the node invariant and keeps the rest in catalog order.
pub fn sanitize_catalog(catalog: Vec<NetworkDescriptor>) -> Vec<NetworkDescriptor> {
    let mut seen = HashSet::new();
    catalog
        .into_iter()
        .filter(|descriptor| match descriptor.validate() {
            Ok(()) => true,
            Err(reason) => {
                log::warn!("dropping invalid network descriptor: {reason}");
                false
            }
        })
        .filter(|descriptor| {
            let fresh = seen.insert(descriptor.name.clone());
            if !fresh {
                log::warn!("dropping duplicate network descriptor: {}", descriptor.name);
            }
            fresh
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub name: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
    pub avg_in_degree: f64,
    pub avg_out_degree: f64,
    pub roots: Vec<String>,
    pub leaves: Vec<String>,
    pub variables_preview: String,
    pub total_cpt_entries: u64,
    pub largest_cpts: Vec<(String, u64)>,
    pub state_counts_preview: Vec<(String, u64)>,
}

impl NetworkStats {
    pub fn from_descriptor(network: &NetworkDescriptor) -> Self {
        let n = network.nodes.len();
        let m = network.edges.len();

        let mut in_degree: HashMap<&str, usize> =
            network.nodes.iter().map(|node| (node.as_str(), 0)).collect();
        let mut out_degree = in_degree.clone();
        for (from, to) in &network.edges {
            if let Some(count) = out_degree.get_mut(from.as_str()) {
                *count += 1;
            }
            if let Some(count) = in_degree.get_mut(to.as_str()) {
                *count += 1;
            }
        }

        let average = |degrees: &HashMap<&str, usize>| {
            if degrees.is_empty() {
                0.0
            } else {
                degrees.values().sum::<usize>() as f64 / degrees.len() as f64
            }
        };
        let density = if n > 1 {
            m as f64 / (n * (n - 1)) as f64
        } else {
            0.0
        };

        let roots = network
            .nodes
            .iter()
            .filter(|node| in_degree.get(node.as_str()) == Some(&0))
            .cloned()
            .collect();
        let leaves = network
            .nodes
            .iter()
            .filter(|node| out_degree.get(node.as_str()) == Some(&0))
            .cloned()
            .collect();

        let mut variables_preview = network
            .nodes
            .iter()
            .take(VARIABLES_PREVIEW_LEN)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if n > VARIABLES_PREVIEW_LEN {
            variables_preview.push('…');
        }

        // Stable sort: equal sizes keep the service's order.
        let mut largest_cpts = network.cpt_sizes.clone();
        largest_cpts.sort_by(|a, b| b.1.cmp(&a.1));
        largest_cpts.truncate(LARGEST_CPT_COUNT);

        let state_counts_preview = network
            .state_counts
            .iter()
            .take(STATE_COUNT_PREVIEW_LEN)
            .cloned()
            .collect();

        Self {
            name: network.name.clone(),
            node_count: n,
            edge_count: m,
            density,
            avg_in_degree: average(&in_degree),
            avg_out_degree: average(&out_degree),
            roots,
            leaves,
            variables_preview,
            total_cpt_entries: network.total_cpt_entries(),
            largest_cpts,
            state_counts_preview,
        }
    }
}
