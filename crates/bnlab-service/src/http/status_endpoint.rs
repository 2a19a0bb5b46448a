use tiny_http::{Header, Request, Response};

pub fn handle_metrics(request: Request) {
    let body = crate::metrics::metrics_prometheus();
    let mut response = Response::from_string(body);
    if let Ok(content_type) = Header::from_bytes(b"Content-Type", b"text/plain; version=0.0.4") {
        response = response.with_header(content_type);
    }
    let _ = request.respond(response);
}

pub fn handle_health(request: Request) {
    let body = serde_json::json!({
        "status": "ok",
        "version": bnlab_core::core_version(),
    });
    let _ = request.respond(json_response(body.to_string()));
}

pub fn handle_not_found(request: Request) {
    let _ = request.respond(Response::from_string("{}").with_status_code(404));
}

pub(crate) fn json_response(body: String) -> Response<std::io::Cursor<Vec<u8>>> {
    let mut response = Response::from_string(body);
    if let Ok(content_type) = Header::from_bytes(b"Content-Type", b"application/json") {
        response = response.with_header(content_type);
    }
    response
}
