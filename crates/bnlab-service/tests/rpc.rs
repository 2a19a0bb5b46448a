mod support;

use bnlab_core::rpc::types::JsonRpcRequest;
use std::io::{Read, Write};
use std::net::TcpStream;

fn post_rpc_raw(addr: &str, body: &str, headers: &[(&str, &str)]) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).expect("connect server");
    let mut request = format!("POST /rpc HTTP/1.1\r\nHost: {addr}\r\n");
    for (name, value) in headers {
        request.push_str(name);
        request.push_str(": ");
        request.push_str(value);
        request.push_str("\r\n");
    }
    request.push_str(&format!("Content-Length: {}\r\n\r\n{}", body.len(), body));
    stream.write_all(request.as_bytes()).expect("write");
    stream.shutdown(std::net::Shutdown::Write).ok();

    let mut buf = String::new();
    stream.read_to_string(&mut buf).expect("read");
    let status = buf
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|value| value.parse::<u16>().ok())
        .expect("status");
    let body = buf.split("\r\n\r\n").nth(1).unwrap_or("").to_string();
    (status, body)
}

fn call(method: &str, params: Option<serde_json::Value>) -> serde_json::Value {
    let server = bnlab_service::start_one_shot_server().expect("start server");
    let req = JsonRpcRequest {
        id: 1,
        method: method.to_string(),
        params,
    };
    let json = serde_json::to_string(&req).expect("serialize");
    let (status, body) = post_rpc_raw(&server.addr, &json, &[("Content-Type", "application/json")]);
    assert_eq!(status, 200, "unexpected status {status}: {body}");
    let value: serde_json::Value = serde_json::from_str(&body).expect("parse response");
    value.get("result").cloned().expect("result")
}

fn event_kinds(result: &serde_json::Value) -> Vec<String> {
    result["events"]
        .as_array()
        .map(|events| {
            events
                .iter()
                .filter_map(|event| event["kind"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn rpc_initialize_roundtrip() {
    let result = call("initialize", None);
    assert_eq!(result["server_name"], "bnlab-service");
}

#[test]
fn rpc_rejects_non_json_and_cross_site_calls() {
    let server = bnlab_service::start_one_shot_server().expect("start server");
    let (status, _) = post_rpc_raw(&server.addr, "{}", &[("Content-Type", "text/plain")]);
    assert_eq!(status, 415);

    let server = bnlab_service::start_one_shot_server().expect("start server");
    let (status, _) = post_rpc_raw(
        &server.addr,
        r#"{"id":1,"method":"initialize"}"#,
        &[
            ("Content-Type", "application/json"),
            ("Origin", "https://evil.example"),
        ],
    );
    assert_eq!(status, 403);
}

/// One test drives the whole session because the controller is process-wide.
#[test]
fn rpc_session_flow_against_fake_service() {
    let base = support::inference_service();
    let db_path = std::env::temp_dir().join(format!("bnlab-rpc-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&db_path);
    std::env::set_var("BNLAB_API_BASE", &base);
    std::env::set_var("BNLAB_DEPLOY_BASE", &base);
    std::env::set_var("BNLAB_FALLBACK_BASES", &base);
    std::env::set_var("BNLAB_DB_PATH", &db_path);

    let connected = call("session/connect", None);
    assert!(connected.get("error").is_none(), "{connected}");
    assert_eq!(connected["state"]["networkName"], "chain");
    assert_eq!(connected["state"]["queryVariable"], "A");
    assert!(event_kinds(&connected).contains(&"catalog_loaded".to_string()));

    let listed = call("network/list", None);
    assert_eq!(listed["items"][0]["nodeCount"], 3);
    assert_eq!(listed["items"].as_array().map(Vec::len), Some(1));

    let info = call("network/info", None);
    assert_eq!(info["roots"], serde_json::json!(["A"]));
    assert_eq!(info["leaves"], serde_json::json!(["C"]));

    let toggled = call("evidence/toggle", Some(serde_json::json!({"node": "B"})));
    assert_eq!(toggled["state"]["evidence"]["B"], 1);

    let rejected = call("evidence/toggle", Some(serde_json::json!({"node": "A"})));
    assert_eq!(event_kinds(&rejected), vec!["notice".to_string()]);
    assert!(rejected["state"]["evidence"].get("A").is_none());

    let single = call("inference/run", None);
    assert_eq!(
        event_kinds(&single),
        vec!["run_state", "single_result", "run_state"]
    );
    assert_eq!(single["events"][1]["view"]["pTrueText"], "0.7000");

    call("compare/set", Some(serde_json::json!({"enabled": true})));
    let compared = call("inference/run", None);
    let result = &compared["events"][1];
    assert_eq!(result["kind"], "compare_result");
    assert_eq!(result["gibbs"]["pTrueText"], "0.6800");
    assert_eq!(result["series"][0]["name"], "VE");

    let locked = call("algorithm/set", Some(serde_json::json!({"algorithm": "gibbs"})));
    assert!(locked["error"].as_str().unwrap_or("").contains("compare"));

    let snapshot = call("session/get", None);
    assert_eq!(snapshot["catalog"]["status"], "ready");
    assert_eq!(snapshot["state"]["compareEnabled"], true);
    assert!(snapshot["diagnostic"].is_null());

    let _ = std::fs::remove_file(&db_path);
}
