pub mod rpc_endpoint;
pub mod server;
pub mod status_endpoint;

pub(crate) mod backend_router;
