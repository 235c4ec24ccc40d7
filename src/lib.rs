pub mod api;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod persist;
pub mod trigger;
pub mod utils;
pub mod webhook;

use axum::{Router, extract::DefaultBodyLimit, routing};
use std::sync::Arc;

use config::Settings;
use error::Result;
use persist::PayloadArchive;
use trigger::TriggerClient;

/// Read-only state shared by all request handlers
pub struct AppState {
    pub settings: Settings,
    pub trigger: TriggerClient,
    pub archive: PayloadArchive,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self> {
        let trigger = TriggerClient::new(&settings)?;
        let archive = PayloadArchive::new(settings.hooks_dir.clone());
        Ok(Self {
            settings,
            trigger,
            archive,
        })
    }
}

pub type SharedState = Arc<AppState>;

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::get(api::root))
        .route("/webhook", routing::post(api::handle_webhook))
        // GitLab payloads carry full issue and merge request descriptions
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}
