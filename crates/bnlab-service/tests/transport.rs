mod support;

use bnlab_core::inference::InferenceRequest;
use bnlab_core::session::{Algorithm, SessionState};
use bnlab_service::endpoint::{resolve_catalog, ResolveStatus, RetryPolicy};
use bnlab_service::transport::{HttpTransport, ServiceTransport, TransportError};
use std::time::Duration;

use support::{dead_base, inference_service, spawn_fake_service, FakeReply};

fn transport() -> HttpTransport {
    HttpTransport::new(reqwest::blocking::Client::new(), Duration::from_secs(5))
}

fn request(network: &str) -> InferenceRequest {
    let state = SessionState {
        network_name: Some(network.to_string()),
        query_variable: Some("C".to_string()),
        ..SessionState::default()
    };
    InferenceRequest::from_session(&state, Algorithm::Gibbs).expect("request")
}

#[test]
fn catalog_is_fetched_and_parsed() {
    let base = inference_service();
    let catalog = transport()
        .fetch_catalog(&base, Duration::from_secs(5))
        .expect("catalog");
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog[0].edges[1], ("B".to_string(), "C".to_string()));
    assert_eq!(catalog[0].total_cpt_entries(), 10);
}

#[test]
fn inference_answer_is_parsed() {
    let base = inference_service();
    let result = transport()
        .run_inference(&base, &request("chain"))
        .expect("inference");
    assert_eq!(result.probability("1"), 0.68);
    assert_eq!(result.samples, Some(1000));
}

#[test]
fn remote_detail_is_carried_verbatim() {
    let base = inference_service();
    let err = transport()
        .run_inference(&base, &request("missing"))
        .expect_err("unknown network");
    assert_eq!(
        err,
        TransportError::Status {
            status: 404,
            message: "Network not found".to_string()
        }
    );
    assert_eq!(err.to_string(), "Network not found");
}

#[test]
fn slow_catalog_attempt_times_out() {
    let base = spawn_fake_service(|_, _, _| FakeReply {
        status: 200,
        body: "[]".to_string(),
        delay: Duration::from_millis(1500),
    });
    let err = transport()
        .fetch_catalog(&base, Duration::from_millis(200))
        .expect_err("timeout");
    assert_eq!(err, TransportError::Timeout(Duration::from_millis(200)));
}

#[test]
fn resolver_skips_dead_candidate_and_drops_invalid_descriptors() {
    let good = inference_service();
    let dead = dead_base();
    let policy = RetryPolicy {
        max_attempts: 2,
        backoff_base: Duration::from_millis(10),
        attempt_timeout: Duration::from_secs(2),
    };
    let mut failures = Vec::new();
    let resolved = resolve_catalog(
        &transport(),
        &[dead.clone(), good.clone()],
        &policy,
        |status| {
            if let ResolveStatus::AttemptFailed(failure) = status {
                failures.push(failure);
            }
        },
    )
    .expect("resolve");

    assert_eq!(resolved.base, good);
    assert_eq!(resolved.failed_attempts, 2);
    assert!(failures.iter().all(|f| f.candidate == dead));
    let names: Vec<_> = resolved.catalog.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["chain"]);
}
