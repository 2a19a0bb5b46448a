use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

static RESOLVE_ATTEMPTS: AtomicUsize = AtomicUsize::new(0);
static RESOLVE_FAILURES: AtomicUsize = AtomicUsize::new(0);
static INFERENCE_REQUESTS: AtomicUsize = AtomicUsize::new(0);
static INFERENCE_FAILURES: AtomicUsize = AtomicUsize::new(0);
static INFERENCE_DURATION_MS_TOTAL: AtomicU64 = AtomicU64::new(0);
static RPC_TOTAL_REQUESTS: AtomicUsize = AtomicUsize::new(0);
static RPC_FAILED_REQUESTS: AtomicUsize = AtomicUsize::new(0);
static RPC_REQUEST_DURATION_MS_TOTAL: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct MetricsSnapshot {
    pub resolve_attempts: usize,
    pub resolve_failures: usize,
    pub inference_requests: usize,
    pub inference_failures: usize,
    pub inference_duration_ms_total: u64,
    pub rpc_total_requests: usize,
    pub rpc_failed_requests: usize,
    pub rpc_request_duration_ms_total: u64,
}

/// Counts an RPC call as failed unless `mark_success` runs before drop.
pub(crate) struct RpcRequestGuard {
    started_at: Instant,
    failed: bool,
}

impl Drop for RpcRequestGuard {
    fn drop(&mut self) {
        let duration_ms = duration_to_millis(self.started_at.elapsed());
        RPC_REQUEST_DURATION_MS_TOTAL.fetch_add(duration_ms, Ordering::Relaxed);
        if self.failed {
            RPC_FAILED_REQUESTS.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl RpcRequestGuard {
    pub(crate) fn mark_success(&mut self) {
        self.failed = false;
    }
}

pub(crate) fn begin_rpc_request() -> RpcRequestGuard {
    RPC_TOTAL_REQUESTS.fetch_add(1, Ordering::Relaxed);
    RpcRequestGuard {
        started_at: Instant::now(),
        failed: true,
    }
}

pub(crate) fn record_resolve_attempt() {
    RESOLVE_ATTEMPTS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_resolve_failure() {
    RESOLVE_FAILURES.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_inference_outcome(success: bool, duration: Duration) {
    INFERENCE_REQUESTS.fetch_add(1, Ordering::Relaxed);
    if !success {
        INFERENCE_FAILURES.fetch_add(1, Ordering::Relaxed);
    }
    INFERENCE_DURATION_MS_TOTAL.fetch_add(duration_to_millis(duration), Ordering::Relaxed);
}

pub(crate) fn duration_to_millis(duration: Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}

pub(crate) fn metrics_snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        resolve_attempts: RESOLVE_ATTEMPTS.load(Ordering::Relaxed),
        resolve_failures: RESOLVE_FAILURES.load(Ordering::Relaxed),
        inference_requests: INFERENCE_REQUESTS.load(Ordering::Relaxed),
        inference_failures: INFERENCE_FAILURES.load(Ordering::Relaxed),
        inference_duration_ms_total: INFERENCE_DURATION_MS_TOTAL.load(Ordering::Relaxed),
        rpc_total_requests: RPC_TOTAL_REQUESTS.load(Ordering::Relaxed),
        rpc_failed_requests: RPC_FAILED_REQUESTS.load(Ordering::Relaxed),
        rpc_request_duration_ms_total: RPC_REQUEST_DURATION_MS_TOTAL.load(Ordering::Relaxed),
    }
}

pub(crate) fn metrics_prometheus() -> String {
    let m = metrics_snapshot();
    format!(
        "bnlab_resolve_attempts_total {}\n\
bnlab_resolve_failures_total {}\n\
bnlab_inference_requests_total {}\n\
bnlab_inference_failures_total {}\n\
bnlab_inference_duration_milliseconds_total {}\n\
bnlab_inference_duration_milliseconds_count {}\n\
bnlab_rpc_requests_total {}\n\
bnlab_rpc_requests_failed_total {}\n\
bnlab_rpc_request_duration_milliseconds_total {}\n\
bnlab_rpc_request_duration_milliseconds_count {}\n",
        m.resolve_attempts,
        m.resolve_failures,
        m.inference_requests,
        m.inference_failures,
        m.inference_duration_ms_total,
        m.inference_requests,
        m.rpc_total_requests,
        m.rpc_failed_requests,
        m.rpc_request_duration_ms_total,
        m.rpc_total_requests,
    )
}
