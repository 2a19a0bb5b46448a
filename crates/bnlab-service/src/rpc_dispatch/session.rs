use bnlab_core::rpc::types::{JsonRpcRequest, JsonRpcResponse, NetworkListResult, NetworkSummary};

use crate::controller::CatalogState;
use crate::session_host;

pub(super) fn try_handle(req: &JsonRpcRequest) -> Option<JsonRpcResponse> {
    let result = match req.method.as_str() {
        "session/connect" => super::value_or_error(session_host::connect()),
        "session/get" => super::value_or_error(session_host::read(|c| c.snapshot())),
        "network/list" => super::value_or_error(session_host::read(|c| match c.catalog() {
            CatalogState::Ready { networks, .. } => NetworkListResult {
                items: networks
                    .iter()
                    .map(|network| NetworkSummary {
                        name: network.name.clone(),
                        node_count: network.nodes.len(),
                        edge_count: network.edges.len(),
                        variable_count: network.variables.len(),
                    })
                    .collect(),
            },
            _ => NetworkListResult { items: Vec::new() },
        })),
        "network/select" => match super::str_param(req, "name") {
            Some(name) => super::value_or_error(session_host::apply(|c, out| {
                c.select_network(name, out)
            })),
            None => super::missing("name"),
        },
        "network/info" => super::value_or_error(
            session_host::read(|c| c.network_info().map_err(|err| err.to_string()))
                .and_then(|info| info),
        ),
        _ => return None,
    };

    Some(super::response(req, result))
}
