#![allow(dead_code)]

use std::io::Read;
use std::thread;
use std::time::Duration;

use tiny_http::{Header, Response, Server};

pub const CHAIN_CATALOG: &str = r#"[
  {"name": "chain", "nodes": ["A", "B", "C"], "edges": [["A", "B"], ["B", "C"]],
   "variables": ["A", "B", "C"], "cpt_sizes": {"A": 2, "B": 4, "C": 4},
   "state_counts": {"A": 2, "B": 2, "C": 2}},
  {"name": "broken", "nodes": ["X"], "edges": [["X", "Y"]], "variables": ["X"]}
]"#;

pub struct FakeReply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl FakeReply {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }
}

/// Starts a loopback inference service. `handler` gets method, path and body.
/// Returns the `/api` base of the service.
pub fn spawn_fake_service<F>(handler: F) -> String
where
    F: Fn(&str, &str, &str) -> FakeReply + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("bind fake service");
    let addr = server
        .server_addr()
        .to_ip()
        .expect("fake service addr")
        .to_string();
    thread::spawn(move || {
        for mut request in server.incoming_requests() {
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let method = request.method().as_str().to_string();
            let path = request.url().to_string();
            let reply = handler(&method, &path, &body);
            if !reply.delay.is_zero() {
                thread::sleep(reply.delay);
            }
            let content_type =
                Header::from_bytes(b"Content-Type", b"application/json").expect("header");
            let response = Response::from_string(reply.body)
                .with_status_code(reply.status)
                .with_header(content_type);
            let _ = request.respond(response);
        }
    });
    format!("http://{addr}/api")
}

/// Standard fake: serves the chain catalog and answers inference per algorithm.
pub fn inference_service() -> String {
    spawn_fake_service(|method, path, body| match (method, path) {
        ("GET", "/api/networks") => FakeReply::json(200, CHAIN_CATALOG),
        ("POST", "/api/inference") => {
            let payload: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
            if payload["network"] != "chain" {
                return FakeReply::json(404, r#"{"detail":"Network not found"}"#);
            }
            let algorithm = payload["algorithm"].as_str().unwrap_or("");
            let (p0, p1) = if algorithm == "gibbs" { (0.32, 0.68) } else { (0.3, 0.7) };
            FakeReply::json(
                200,
                serde_json::json!({
                    "probabilities": {"0": p0, "1": p1},
                    "time_ms": 12.5,
                    "algorithm": algorithm,
                    "samples": payload["samples"],
                })
                .to_string(),
            )
        }
        _ => FakeReply::json(404, r#"{"detail":"Not Found"}"#),
    })
}

/// Base URL on a loopback port nobody listens on.
pub fn dead_base() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}/api")
}
