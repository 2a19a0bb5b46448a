use bnlab_service::runtime_config;

fn load_env_from_exe_dir() {
    let exe_path = match std::env::current_exe() {
        Ok(path) => path,
        Err(err) => {
            log::warn!("failed to resolve current exe path: {err}");
            return;
        }
    };
    let Some(path) = exe_path.parent().and_then(runtime_config::find_env_file) else {
        return;
    };
    match runtime_config::load_env_file(&path) {
        Ok(0) => {}
        Ok(applied) => log::info!("loaded {applied} env vars from {}", path.display()),
        Err(err) => log::warn!("failed to read env file {}: {err}", path.display()),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bnlab_service=info,bnlab_core=info".into()),
        )
        .init();

    load_env_from_exe_dir();
    let addr = runtime_config::service_addr();
    if let Err(err) = bnlab_service::start_server(&addr) {
        log::error!("bnlab-service stopped: {err}");
        std::process::exit(1);
    }
}
