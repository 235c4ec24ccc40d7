//! Webhook handler for GitLab issue, note and merge request events

use axum::{
    Json,
    body::Bytes,
    extract::State as AxumState,
    http::{HeaderMap, StatusCode},
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::SharedState;
use crate::extract::extract;
use crate::trigger::TriggeredPipeline;
use crate::utils::{sanitize_headers, validate_webhook_token};
use crate::webhook::{EVENT_HEADER, EventKind, TOKEN_HEADER, route_event};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ignored,
    Error,
    Queued,
}

/// JSON body returned to the webhook sender
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WebhookResponse {
    Rejected {
        status: ResponseStatus,
        reason: String,
    },
    Queued {
        status: ResponseStatus,
        pipeline_id: Option<u64>,
        web_url: Option<String>,
        #[serde(rename = "ref")]
        git_ref: Option<String>,
    },
}

impl WebhookResponse {
    fn ignored(reason: impl Into<String>) -> Self {
        Self::Rejected {
            status: ResponseStatus::Ignored,
            reason: reason.into(),
        }
    }

    fn error(reason: impl Into<String>) -> Self {
        Self::Rejected {
            status: ResponseStatus::Error,
            reason: reason.into(),
        }
    }

    fn queued(pipeline: TriggeredPipeline) -> Self {
        Self::Queued {
            status: ResponseStatus::Queued,
            pipeline_id: pipeline.id,
            web_url: pipeline.web_url,
            git_ref: pipeline.git_ref,
        }
    }
}

/// Root health check endpoint
pub async fn root() -> &'static str {
    "gitlab_trigger_relay - healthy"
}

/// Handles the GitLab webhook POST request.
pub async fn handle_webhook(
    AxumState(state): AxumState<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    let (status, response) = process_webhook(&state, &headers, &body).await;
    (status, Json(response))
}

async fn process_webhook(
    state: &SharedState,
    headers: &HeaderMap,
    body: &[u8],
) -> (StatusCode, WebhookResponse) {
    let header_token = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
    if !validate_webhook_token(header_token, state.settings.webhook_secret_token.as_deref()) {
        return (
            StatusCode::UNAUTHORIZED,
            WebhookResponse::ignored("Invalid webhook token"),
        );
    }

    let event_header = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok());
    debug!("Incoming headers: {:?}", sanitize_headers(headers));
    let Some(kind) = EventKind::from_header(event_header) else {
        debug!("Ignoring event: {:?}", event_header);
        return (
            StatusCode::ACCEPTED,
            WebhookResponse::ignored("Unsupported event type"),
        );
    };

    // Only non-empty JSON objects are accepted
    let payload = match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(v) if v.as_object().is_some_and(|o| !o.is_empty()) => v,
        Ok(_) => {
            warn!("Received request without JSON payload");
            return (
                StatusCode::BAD_REQUEST,
                WebhookResponse::error("Expected JSON payload"),
            );
        }
        Err(e) => {
            warn!("Could not parse JSON body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                WebhookResponse::error("Expected JSON payload"),
            );
        }
    };

    match state.archive.persist(kind.slug(), &payload).await {
        Ok(path) => info!("Persisted webhook payload to {}", path.display()),
        Err(e) => warn!("Failed to persist webhook payload: {}", e),
    }

    let route = match route_event(kind, &payload) {
        Ok(route) => route,
        Err(reason) => {
            debug!("{}", reason);
            return (StatusCode::ACCEPTED, WebhookResponse::ignored(reason));
        }
    };

    info!("Processing {:?} event", route);
    let variables = match extract(route, &payload, &state.settings) {
        Ok(vars) => vars,
        Err(rejection) => {
            info!("Skipping event: {}", rejection);
            return (
                StatusCode::ACCEPTED,
                WebhookResponse::ignored(rejection.to_string()),
            );
        }
    };

    match state.trigger.trigger(&variables).await {
        Ok(pipeline) => (StatusCode::OK, WebhookResponse::queued(pipeline)),
        Err(e) => {
            error!("Pipeline trigger failed: {}", e);
            let status = StatusCode::from_u16(e.status()).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, WebhookResponse::error(e.to_string()))
        }
    }
}
