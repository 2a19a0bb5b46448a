use bnlab_core::network::{sanitize_catalog, NetworkDescriptor};
use serde::Serialize;
use std::thread;
use std::time::Duration;

use super::candidates::candidate_host;
use super::policy::RetryPolicy;
use crate::transport::ServiceTransport;

/// Diagnostic for one failed catalog attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptFailure {
    pub candidate: String,
    pub attempt: u32,
    pub max_attempts: u32,
    pub error: String,
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveStatus {
    AttemptFailed(AttemptFailure),
    Cleared,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEndpoint {
    pub base: String,
    pub catalog: Vec<NetworkDescriptor>,
    pub failed_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no inference service candidates configured")]
    NoCandidates,
    #[error("inference service unreachable after {attempts} attempts; last error: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// Tries each candidate in order, up to `policy.max_attempts` times, and commits to
/// the first one that serves a parseable catalog. Attempts never overlap.
pub fn resolve_catalog<T, F>(
    transport: &T,
    candidates: &[String],
    policy: &RetryPolicy,
    on_status: F,
) -> Result<ResolvedEndpoint, ResolveError>
where
    T: ServiceTransport + ?Sized,
    F: FnMut(ResolveStatus),
{
    resolve_with_sleeper(transport, candidates, policy, on_status, thread::sleep)
}

fn resolve_with_sleeper<T, F, S>(
    transport: &T,
    candidates: &[String],
    policy: &RetryPolicy,
    mut on_status: F,
    mut sleep: S,
) -> Result<ResolvedEndpoint, ResolveError>
where
    T: ServiceTransport + ?Sized,
    F: FnMut(ResolveStatus),
    S: FnMut(Duration),
{
    if candidates.is_empty() {
        return Err(ResolveError::NoCandidates);
    }
    let mut failed_attempts = 0u32;
    let mut last_error = String::new();

    for candidate in candidates {
        for attempt in 1..=policy.max_attempts {
            crate::metrics::record_resolve_attempt();
            match transport.fetch_catalog(candidate, policy.attempt_timeout) {
                Ok(catalog) => {
                    log::info!(
                        "inference service resolved: base={candidate}, attempt={attempt}, networks={}",
                        catalog.len()
                    );
                    on_status(ResolveStatus::Cleared);
                    return Ok(ResolvedEndpoint {
                        base: candidate.clone(),
                        catalog: sanitize_catalog(catalog),
                        failed_attempts,
                    });
                }
                Err(err) => {
                    failed_attempts += 1;
                    crate::metrics::record_resolve_failure();
                    last_error = err.to_string();
                    log::warn!(
                        "catalog fetch failed: base={candidate}, attempt={attempt}/{}, err={last_error}",
                        policy.max_attempts
                    );
                    on_status(ResolveStatus::AttemptFailed(AttemptFailure {
                        candidate: candidate.clone(),
                        attempt,
                        max_attempts: policy.max_attempts,
                        error: last_error.clone(),
                        host: candidate_host(candidate),
                    }));
                    if policy.has_next_attempt(attempt) {
                        let wait = policy.backoff_after(attempt);
                        if !wait.is_zero() {
                            sleep(wait);
                        }
                    }
                }
            }
        }
    }

    Err(ResolveError::Exhausted {
        attempts: failed_attempts,
        last_error,
    })
}
