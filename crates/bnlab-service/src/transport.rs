use bnlab_core::inference::{InferenceRequest, InferenceResult};
use bnlab_core::network::NetworkDescriptor;
use reqwest::blocking::{Client, Response};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("{0}")]
    Network(String),
    /// Non-2xx answer. `message` is the service's `detail` when it sent one.
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// The two calls the controller makes against the inference service.
pub trait ServiceTransport: Send + Sync {
    fn fetch_catalog(
        &self,
        base: &str,
        timeout: Duration,
    ) -> Result<Vec<NetworkDescriptor>, TransportError>;

    fn run_inference(
        &self,
        base: &str,
        request: &InferenceRequest,
    ) -> Result<InferenceResult, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    inference_timeout: Duration,
}

impl HttpTransport {
    pub fn new(client: Client, inference_timeout: Duration) -> Self {
        Self {
            client,
            inference_timeout,
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            crate::runtime_config::service_client().clone(),
            crate::runtime_config::inference_timeout(),
        )
    }
}

impl ServiceTransport for HttpTransport {
    fn fetch_catalog(
        &self,
        base: &str,
        timeout: Duration,
    ) -> Result<Vec<NetworkDescriptor>, TransportError> {
        let url = format!("{base}/networks");
        // The per-request timeout drops the connection, so a slow attempt cannot
        // finish after the resolver has moved on.
        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .map_err(|err| map_send_error(err, timeout))?;
        let response = ensure_success(response)?;
        response
            .json::<Vec<NetworkDescriptor>>()
            .map_err(|err| map_body_error(err, timeout))
    }

    fn run_inference(
        &self,
        base: &str,
        request: &InferenceRequest,
    ) -> Result<InferenceResult, TransportError> {
        let url = format!("{base}/inference");
        let response = self
            .client
            .post(&url)
            .timeout(self.inference_timeout)
            .json(request)
            .send()
            .map_err(|err| map_send_error(err, self.inference_timeout))?;
        let response = ensure_success(response)?;
        response
            .json::<InferenceResult>()
            .map_err(|err| map_body_error(err, self.inference_timeout))
    }
}

fn ensure_success(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        message: error_message(status.as_u16(), &body),
    })
}

/// Prefers the service's `detail` field verbatim; falls back to the raw body.
pub(crate) fn error_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("detail").cloned());
    match detail {
        Some(serde_json::Value::String(text)) => text,
        Some(serde_json::Value::Null) | None => {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {status}")
            } else {
                format!("HTTP {status}: {trimmed}")
            }
        }
        Some(other) => other.to_string(),
    }
}

fn map_send_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else {
        TransportError::Network(err.to_string())
    }
}

fn map_body_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else {
        TransportError::Decode(err.to_string())
    }
}
