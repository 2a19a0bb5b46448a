use bnlab_core::rpc::types::{JsonRpcRequest, JsonRpcResponse};
use std::io::Read;
use tiny_http::Request;
use tiny_http::Response;
use url::Url;

use crate::http::status_endpoint::json_response;

fn rpc_response_failed(resp: &JsonRpcResponse) -> bool {
    resp.result.get("error").is_some()
}

fn get_header_value<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request
        .headers()
        .iter()
        .find(|header| header.field.as_str().as_str().eq_ignore_ascii_case(name))
        .map(|header| header.value.as_str().trim())
        .filter(|value| !value.is_empty())
}

fn is_json_content_type(request: &Request) -> bool {
    get_header_value(request, "Content-Type")
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// Browser origins allowed to drive the session: loopback pages only.
pub(crate) fn is_loopback_origin(origin: &str) -> bool {
    let Ok(url) = Url::parse(origin) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"))
}

fn reject(request: Request, status: u16) {
    let _ = request.respond(Response::from_string("{}").with_status_code(status));
}

pub fn handle_rpc(mut request: Request) {
    let mut rpc_metrics_guard = crate::metrics::begin_rpc_request();
    if request.method().as_str() != "POST" {
        reject(request, 405);
        return;
    }
    if !is_json_content_type(&request) {
        reject(request, 415);
        return;
    }
    if let Some(fetch_site) = get_header_value(&request, "Sec-Fetch-Site") {
        if fetch_site.eq_ignore_ascii_case("cross-site") {
            reject(request, 403);
            return;
        }
    }
    if let Some(origin) = get_header_value(&request, "Origin") {
        if !is_loopback_origin(origin) {
            reject(request, 403);
            return;
        }
    }

    let mut body = String::new();
    if request.as_reader().read_to_string(&mut body).is_err() || body.trim().is_empty() {
        reject(request, 400);
        return;
    }
    let req: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(_) => {
            reject(request, 400);
            return;
        }
    };

    let resp = crate::handle_request(req);
    if rpc_response_failed(&resp) {
        log::debug!("rpc call returned an error: id={}", resp.id);
    } else {
        rpc_metrics_guard.mark_success();
    }
    let json = serde_json::to_string(&resp).unwrap_or_else(|_| "{}".to_string());
    let _ = request.respond(json_response(json));
}
