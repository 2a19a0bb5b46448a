use bnlab_core::rpc::types::{JsonRpcRequest, JsonRpcResponse};
use std::io;
use std::thread;

pub mod controller;
pub mod endpoint;
pub mod inference;
pub mod presentation;
pub mod runtime_config;
pub mod transport;

mod http;
mod metrics;
mod rpc_dispatch;
mod session_host;
mod storage_helpers;

#[cfg(test)]
mod test_support;

pub const DEFAULT_ADDR: &str = "localhost:48770";

pub struct ServerHandle {
    pub addr: String,
    join: thread::JoinHandle<()>,
}

impl ServerHandle {
    pub fn join(self) {
        let _ = self.join.join();
    }
}

/// Serves exactly one request on an ephemeral loopback port.
pub fn start_one_shot_server() -> std::io::Result<ServerHandle> {
    let server = tiny_http::Server::http("127.0.0.1:0")
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    let addr = server
        .server_addr()
        .to_ip()
        .map(|a| a.to_string())
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "server addr missing"))?;
    let join = thread::spawn(move || {
        if let Some(request) = server.incoming_requests().next() {
            crate::http::backend_router::handle_backend_request(request);
        }
    });
    Ok(ServerHandle { addr, join })
}

pub fn start_server(addr: &str) -> std::io::Result<()> {
    // Migrate up front so a broken database shows in the log before the first RPC.
    if let Err(err) = storage_helpers::initialize_storage() {
        log::warn!("storage startup init skipped: {}", err);
    }
    http::server::start_http(addr)
}

pub(crate) fn handle_request(req: JsonRpcRequest) -> JsonRpcResponse {
    rpc_dispatch::handle_request(req)
}
