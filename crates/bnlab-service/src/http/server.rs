use std::io;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use tiny_http::{Request, Server};

const HTTP_WORKER_FACTOR: usize = 2;
const HTTP_WORKER_MIN: usize = 4;
const HTTP_QUEUE_FACTOR: usize = 4;
const HTTP_QUEUE_MIN: usize = 32;
const ENV_HTTP_WORKER_FACTOR: &str = "BNLAB_HTTP_WORKER_FACTOR";
const ENV_HTTP_WORKER_MIN: &str = "BNLAB_HTTP_WORKER_MIN";
const ENV_HTTP_QUEUE_FACTOR: &str = "BNLAB_HTTP_QUEUE_FACTOR";
const ENV_HTTP_QUEUE_MIN: &str = "BNLAB_HTTP_QUEUE_MIN";

fn http_worker_count() -> usize {
    // An inference RPC occupies its worker for the whole round trip.
    let cpus = thread::available_parallelism()
        .map(|value| value.get())
        .unwrap_or(4);
    let factor = env_usize_or(ENV_HTTP_WORKER_FACTOR, HTTP_WORKER_FACTOR).max(1);
    let min = env_usize_or(ENV_HTTP_WORKER_MIN, HTTP_WORKER_MIN).max(1);
    cpus.saturating_mul(factor).max(min)
}

fn http_queue_size(worker_count: usize) -> usize {
    let factor = env_usize_or(ENV_HTTP_QUEUE_FACTOR, HTTP_QUEUE_FACTOR).max(1);
    let min = env_usize_or(ENV_HTTP_QUEUE_MIN, HTTP_QUEUE_MIN).max(1);
    worker_count.saturating_mul(factor).max(min)
}

fn env_usize_or(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn spawn_request_workers(worker_count: usize, rx: mpsc::Receiver<Request>) {
    let shared_rx = Arc::new(Mutex::new(rx));
    for _ in 0..worker_count {
        let worker_rx = Arc::clone(&shared_rx);
        let _ = thread::spawn(move || loop {
            let request = {
                let Ok(guard) = worker_rx.lock() else {
                    break;
                };
                match guard.recv() {
                    Ok(request) => request,
                    Err(_) => break,
                }
            };
            crate::http::backend_router::handle_backend_request(request);
        });
    }
}

fn run_server(server: Server) {
    let worker_count = http_worker_count();
    let queue_size = http_queue_size(worker_count);
    let (tx, rx) = mpsc::sync_channel::<Request>(queue_size);
    spawn_request_workers(worker_count, rx);

    for request in server.incoming_requests() {
        if request.url() == "/__shutdown" {
            let _ = request.respond(tiny_http::Response::from_string("shutdown"));
            break;
        }
        if tx.send(request).is_err() {
            break;
        }
    }
}

/// Serves until a `/__shutdown` request arrives.
pub fn start_http(addr: &str) -> io::Result<()> {
    let server = Server::http(addr).map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    log::info!("bnlab-service listening on {addr}");
    run_server(server);
    Ok(())
}
