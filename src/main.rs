use gitlab_trigger_relay::config::Settings;
use gitlab_trigger_relay::logging::{FileLogger, setup_logging};
use gitlab_trigger_relay::{AppState, build_router};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Never overrides variables already present in the environment
    dotenv::dotenv().ok();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let _log_guard = match setup_logging(&FileLogger::new(settings.log_dir.clone()), settings.log_debug) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let bind_address = settings.bind_address();
    let state = match AppState::new(settings) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialise application state: {}", e);
            std::process::exit(1);
        }
    };

    info!("Forwarding triggers to {}", state.trigger.trigger_url());
    info!("Archiving payloads under {:?}", state.archive.directory());
    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", bind_address, e);
            std::process::exit(1);
        }
    };
    info!("Listening on {}", bind_address);
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
