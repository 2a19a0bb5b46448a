use tiny_http::Request;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BackendRoute {
    Rpc,
    Metrics,
    Health,
    NotFound,
}

pub(crate) fn resolve_backend_route(method: &str, path: &str) -> BackendRoute {
    let path = path.split('?').next().unwrap_or(path);
    match (method, path) {
        ("POST", "/rpc") => BackendRoute::Rpc,
        ("GET", "/metrics") => BackendRoute::Metrics,
        ("GET", "/health") => BackendRoute::Health,
        _ => BackendRoute::NotFound,
    }
}

pub(crate) fn handle_backend_request(request: Request) {
    let route = resolve_backend_route(request.method().as_str(), request.url());
    match route {
        BackendRoute::Rpc => crate::http::rpc_endpoint::handle_rpc(request),
        BackendRoute::Metrics => crate::http::status_endpoint::handle_metrics(request),
        BackendRoute::Health => crate::http::status_endpoint::handle_health(request),
        BackendRoute::NotFound => crate::http::status_endpoint::handle_not_found(request),
    }
}
