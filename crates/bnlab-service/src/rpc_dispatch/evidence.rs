use bnlab_core::rpc::types::{JsonRpcRequest, JsonRpcResponse};

use crate::session_host;

pub(super) fn try_handle(req: &JsonRpcRequest) -> Option<JsonRpcResponse> {
    let result = match req.method.as_str() {
        "query/select" => match super::str_param(req, "variable") {
            Some(variable) => super::value_or_error(session_host::apply(|c, out| {
                c.select_query(variable, out)
            })),
            None => super::missing("variable"),
        },
        "evidence/toggle" => match super::str_param(req, "node") {
            Some(node) => super::value_or_error(session_host::apply(|c, out| {
                c.toggle_evidence(node, out)
            })),
            None => super::missing("node"),
        },
        "inference/run" => super::value_or_error(session_host::run_inference()),
        _ => return None,
    };

    Some(super::response(req, result))
}
