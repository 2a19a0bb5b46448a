use bnlab_core::rpc::types::{InitializeResult, JsonRpcRequest, JsonRpcResponse};
use serde::Serialize;

mod controls;
mod evidence;
mod session;

pub(crate) const SERVER_NAME: &str = "bnlab-service";

pub(crate) fn handle_request(req: JsonRpcRequest) -> JsonRpcResponse {
    if req.method == "initialize" {
        let result = InitializeResult {
            server_name: SERVER_NAME.to_string(),
            version: bnlab_core::core_version().to_string(),
        };
        return response(&req, as_json(result));
    }

    if let Some(resp) = session::try_handle(&req) {
        return resp;
    }
    if let Some(resp) = evidence::try_handle(&req) {
        return resp;
    }
    if let Some(resp) = controls::try_handle(&req) {
        return resp;
    }

    JsonRpcResponse {
        id: req.id,
        result: serde_json::json!({"error": "unknown_method"}),
    }
}

pub(super) fn response(req: &JsonRpcRequest, result: serde_json::Value) -> JsonRpcResponse {
    JsonRpcResponse {
        id: req.id,
        result,
    }
}

pub(super) fn as_json<T: Serialize>(value: T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

pub(super) fn value_or_error<T: Serialize>(result: Result<T, String>) -> serde_json::Value {
    match result {
        Ok(value) => as_json(value),
        Err(err) => serde_json::json!({"error": err}),
    }
}

pub(super) fn missing(name: &str) -> serde_json::Value {
    serde_json::json!({"error": format!("missing {name}")})
}

fn param<'a>(req: &'a JsonRpcRequest, key: &str) -> Option<&'a serde_json::Value> {
    req.params.as_ref().and_then(|params| params.get(key))
}

pub(super) fn str_param<'a>(req: &'a JsonRpcRequest, key: &str) -> Option<&'a str> {
    param(req, key)
        .and_then(|value| value.as_str())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub(super) fn bool_param(req: &JsonRpcRequest, key: &str) -> Option<bool> {
    param(req, key).and_then(|value| value.as_bool())
}

pub(super) fn u64_param(req: &JsonRpcRequest, key: &str) -> Option<u64> {
    param(req, key).and_then(|value| value.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(method: &str, params: Option<serde_json::Value>) -> serde_json::Value {
        handle_request(JsonRpcRequest {
            id: 1,
            method: method.to_string(),
            params,
        })
        .result
    }

    fn error_of(result: &serde_json::Value) -> &str {
        result.get("error").and_then(|v| v.as_str()).unwrap_or("")
    }

    #[test]
    fn initialize_reports_server_name() {
        let result = call("initialize", None);
        assert_eq!(result["server_name"], SERVER_NAME);
    }

    #[test]
    fn unknown_method_is_reported() {
        assert_eq!(error_of(&call("network/delete", None)), "unknown_method");
    }

    #[test]
    fn required_params_are_checked_before_touching_the_session() {
        for (method, params) in [
            ("network/select", None),
            ("query/select", Some(serde_json::json!({"variable": "  "}))),
            ("evidence/toggle", Some(serde_json::json!({"nodeId": "A"}))),
            ("algorithm/set", Some(serde_json::json!({"algorithm": "mcmc"}))),
            ("samples/set", Some(serde_json::json!({"samples": -5}))),
            ("compare/set", Some(serde_json::json!({"enabled": "yes"}))),
            ("compare/mode", Some(serde_json::json!({"mode": "table"}))),
        ] {
            let result = call(method, params);
            assert!(
                error_of(&result).starts_with("missing") || error_of(&result).starts_with("invalid"),
                "{method}: {result}"
            );
        }
    }
}
