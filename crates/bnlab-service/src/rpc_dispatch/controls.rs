use bnlab_core::rpc::types::{JsonRpcRequest, JsonRpcResponse};
use bnlab_core::session::{Algorithm, CompareDisplayMode};

use crate::session_host;

pub(super) fn try_handle(req: &JsonRpcRequest) -> Option<JsonRpcResponse> {
    let result = match req.method.as_str() {
        "algorithm/set" => match super::str_param(req, "algorithm") {
            Some(raw) => match Algorithm::parse(raw) {
                Some(algorithm) => super::value_or_error(session_host::apply(|c, out| {
                    c.set_algorithm(algorithm, out)
                })),
                None => serde_json::json!({"error": format!("invalid algorithm: {raw}")}),
            },
            None => super::missing("algorithm"),
        },
        "samples/set" => match super::u64_param(req, "samples") {
            Some(samples) => match u32::try_from(samples) {
                Ok(samples) => super::value_or_error(session_host::apply(|c, out| {
                    c.set_sample_count(samples, out)
                })),
                Err(_) => serde_json::json!({"error": format!("invalid samples: {samples}")}),
            },
            None => super::missing("samples"),
        },
        "compare/set" => match super::bool_param(req, "enabled") {
            Some(enabled) => super::value_or_error(session_host::apply(|c, out| {
                c.set_compare_enabled(enabled, out)
            })),
            None => super::missing("enabled"),
        },
        "compare/mode" => match super::str_param(req, "mode") {
            Some(raw) => match CompareDisplayMode::parse(raw) {
                Some(mode) => super::value_or_error(session_host::apply(|c, out| {
                    c.set_compare_mode(mode, out)
                })),
                None => serde_json::json!({"error": format!("invalid mode: {raw}")}),
            },
            None => super::missing("mode"),
        },
        _ => return None,
    };

    Some(super::response(req, result))
}
