use bnlab_core::inference::{InferenceRequest, InferenceResult};
use bnlab_core::network::NetworkDescriptor;
use bnlab_core::session::Algorithm;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::transport::{ServiceTransport, TransportError};

/// `A -> B -> C` chain with binary states.
pub(crate) fn chain_network(name: &str) -> NetworkDescriptor {
    let nodes: Vec<String> = ["A", "B", "C"].iter().map(|n| n.to_string()).collect();
    NetworkDescriptor {
        name: name.to_string(),
        nodes: nodes.clone(),
        edges: vec![
            ("A".to_string(), "B".to_string()),
            ("B".to_string(), "C".to_string()),
        ],
        variables: nodes.clone(),
        cpt_sizes: vec![
            ("A".to_string(), 2),
            ("B".to_string(), 4),
            ("C".to_string(), 4),
        ],
        state_counts: nodes.iter().map(|n| (n.clone(), 2)).collect(),
        total_cpt_entries: None,
    }
}

pub(crate) fn result(p_false: f64, p_true: f64, time_ms: f64) -> InferenceResult {
    InferenceResult {
        probabilities: BTreeMap::from([("0".to_string(), p_false), ("1".to_string(), p_true)]),
        time_ms,
        algorithm: None,
        samples: None,
    }
}

/// In-memory inference service. Unknown bases and algorithms without a scripted
/// answer fail with a network error.
#[derive(Default)]
pub(crate) struct FakeTransport {
    catalogs: HashMap<String, Vec<NetworkDescriptor>>,
    failing_first: Mutex<HashMap<String, u32>>,
    answers: HashMap<Algorithm, Result<InferenceResult, TransportError>>,
    inference_delay: Duration,
    catalog_calls: Mutex<Vec<String>>,
    inference_calls: Mutex<Vec<InferenceRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTransport {
    pub(crate) fn with_catalog(self, base: &str, network: &str) -> Self {
        self.with_networks(base, vec![chain_network(network)])
    }

    pub(crate) fn with_networks(mut self, base: &str, networks: Vec<NetworkDescriptor>) -> Self {
        self.catalogs.insert(base.to_string(), networks);
        self
    }

    pub(crate) fn failing_first(self, base: &str, count: u32) -> Self {
        if let Ok(mut map) = self.failing_first.lock() {
            map.insert(base.to_string(), count);
        }
        self
    }

    pub(crate) fn answering(
        mut self,
        algorithm: Algorithm,
        answer: Result<InferenceResult, TransportError>,
    ) -> Self {
        self.answers.insert(algorithm, answer);
        self
    }

    pub(crate) fn with_inference_delay(mut self, delay: Duration) -> Self {
        self.inference_delay = delay;
        self
    }

    pub(crate) fn catalog_calls(&self) -> Vec<String> {
        self.catalog_calls.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub(crate) fn inference_calls(&self) -> Vec<InferenceRequest> {
        self.inference_calls.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ServiceTransport for FakeTransport {
    fn fetch_catalog(
        &self,
        base: &str,
        _timeout: Duration,
    ) -> Result<Vec<NetworkDescriptor>, TransportError> {
        if let Ok(mut calls) = self.catalog_calls.lock() {
            calls.push(base.to_string());
        }
        if let Ok(mut failing) = self.failing_first.lock() {
            if let Some(remaining) = failing.get_mut(base) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(TransportError::Network("connection reset".to_string()));
                }
            }
        }
        self.catalogs
            .get(base)
            .cloned()
            .ok_or_else(|| TransportError::Network(format!("connection refused: {base}")))
    }

    fn run_inference(
        &self,
        _base: &str,
        request: &InferenceRequest,
    ) -> Result<InferenceResult, TransportError> {
        if let Ok(mut calls) = self.inference_calls.lock() {
            calls.push(request.clone());
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.inference_delay.is_zero() {
            thread::sleep(self.inference_delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.answers
            .get(&request.algorithm)
            .cloned()
            .unwrap_or_else(|| Err(TransportError::Network("no answer scripted".to_string())))
    }
}
