//! HTTP handlers

pub mod webhook;

pub use webhook::{WebhookResponse, handle_webhook, root};
