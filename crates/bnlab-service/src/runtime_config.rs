use reqwest::blocking::Client;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::endpoint::candidates::build_candidates;
use crate::endpoint::policy::RetryPolicy;

static SERVICE_CLIENT: OnceLock<Client> = OnceLock::new();

pub(crate) const DEFAULT_DEPLOY_BASE: &str = "http://localhost:8000/api";
pub(crate) const DEFAULT_FALLBACK_BASES: &str = "http://127.0.0.1:8000/api";
pub(crate) const DEFAULT_DB_FILE: &str = "bnlab.db";
const DEFAULT_RESOLVE_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RESOLVE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RESOLVE_BACKOFF_MS: u64 = 1000;
const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 120;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const ENV_API_BASE: &str = "BNLAB_API_BASE";
const ENV_DEPLOY_BASE: &str = "BNLAB_DEPLOY_BASE";
const ENV_FALLBACK_BASES: &str = "BNLAB_FALLBACK_BASES";
const ENV_RESOLVE_MAX_ATTEMPTS: &str = "BNLAB_RESOLVE_MAX_ATTEMPTS";
const ENV_RESOLVE_TIMEOUT_SECS: &str = "BNLAB_RESOLVE_TIMEOUT_SECS";
const ENV_RESOLVE_BACKOFF_MS: &str = "BNLAB_RESOLVE_BACKOFF_MS";
const ENV_INFERENCE_TIMEOUT_SECS: &str = "BNLAB_INFERENCE_TIMEOUT_SECS";
const ENV_CONNECT_TIMEOUT_SECS: &str = "BNLAB_CONNECT_TIMEOUT_SECS";
const ENV_DB_PATH: &str = "BNLAB_DB_PATH";
const ENV_SERVICE_ADDR: &str = "BNLAB_SERVICE_ADDR";
const ENV_FILE_NAMES: [&str; 2] = ["bnlab.env", ".env"];

/// Shared blocking client. Per-request timeouts are set by the transport, so the
/// client itself only bounds the connect phase.
pub(crate) fn service_client() -> &'static Client {
    SERVICE_CLIENT.get_or_init(|| {
        Client::builder()
            .timeout(None::<Duration>)
            .connect_timeout(connect_timeout())
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .tcp_keepalive(Some(Duration::from_secs(30)))
            .build()
            .unwrap_or_else(|_| Client::new())
    })
}

fn connect_timeout() -> Duration {
    Duration::from_secs(env_u64_or(
        ENV_CONNECT_TIMEOUT_SECS,
        DEFAULT_CONNECT_TIMEOUT_SECS,
    ))
}

pub(crate) fn inference_timeout() -> Duration {
    Duration::from_secs(env_u64_or(
        ENV_INFERENCE_TIMEOUT_SECS,
        DEFAULT_INFERENCE_TIMEOUT_SECS,
    ))
}

pub fn resolve_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: env_u64_or(ENV_RESOLVE_MAX_ATTEMPTS, u64::from(DEFAULT_RESOLVE_MAX_ATTEMPTS))
            .clamp(1, u64::from(u32::MAX)) as u32,
        backoff_base: Duration::from_millis(env_u64_or(
            ENV_RESOLVE_BACKOFF_MS,
            DEFAULT_RESOLVE_BACKOFF_MS,
        )),
        attempt_timeout: Duration::from_secs(env_u64_or(
            ENV_RESOLVE_TIMEOUT_SECS,
            DEFAULT_RESOLVE_TIMEOUT_SECS,
        )),
    }
}

/// Override first, then the deployment default, then the hardcoded fallbacks.
pub fn resolve_candidates() -> Vec<String> {
    let override_base = env_string(ENV_API_BASE);
    let deploy_base =
        env_string(ENV_DEPLOY_BASE).unwrap_or_else(|| DEFAULT_DEPLOY_BASE.to_string());
    let fallbacks = env_string(ENV_FALLBACK_BASES)
        .unwrap_or_else(|| DEFAULT_FALLBACK_BASES.to_string());
    let fallbacks: Vec<String> = fallbacks.split(',').map(str::to_string).collect();
    build_candidates(override_base.as_deref(), &deploy_base, &fallbacks)
}

pub(crate) fn db_path() -> String {
    env_string(ENV_DB_PATH).unwrap_or_else(|| DEFAULT_DB_FILE.to_string())
}

pub fn service_addr() -> String {
    env_string(ENV_SERVICE_ADDR).unwrap_or_else(|| crate::DEFAULT_ADDR.to_string())
}

/// First of `bnlab.env` / `.env` found in `dir`.
pub fn find_env_file(dir: &Path) -> Option<PathBuf> {
    ENV_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Applies `KEY=VALUE` lines from `path`. Variables already set in the process win.
/// Returns how many were applied.
pub fn load_env_file(path: &Path) -> std::io::Result<usize> {
    let bytes = std::fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    let mut applied = 0usize;
    for (key, value) in parse_env_lines(&content) {
        if std::env::var_os(&key).is_some() {
            continue;
        }
        std::env::set_var(&key, value);
        applied += 1;
    }
    Ok(applied)
}

fn parse_env_lines(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (idx, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            log::warn!("skip invalid env line {} (missing '=')", idx + 1);
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim();
        let unquoted = ['"', '\'']
            .iter()
            .find_map(|quote| {
                value
                    .strip_prefix(*quote)
                    .and_then(|rest| rest.strip_suffix(*quote))
            })
            .unwrap_or(value);
        pairs.push((key.to_string(), unquoted.to_string()));
    }
    pairs
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_u64_or(name: &str, default: u64) -> u64 {
    env_string(name)
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}
