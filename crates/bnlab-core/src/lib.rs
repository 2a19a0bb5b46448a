pub mod evidence;
pub mod inference;
pub mod network;
pub mod rpc;
pub mod session;
pub mod storage;

pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
