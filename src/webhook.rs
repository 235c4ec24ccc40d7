//! Webhook event classification and loosely-typed payload access

use serde_json::Value;

pub const EVENT_HEADER: &str = "X-Gitlab-Event";
pub const TOKEN_HEADER: &str = "X-Gitlab-Token";

/// Event families selected by the `X-Gitlab-Event` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Issue,
    Note,
    MergeRequest,
}

impl EventKind {
    /// Returns None for any header value the relay does not handle.
    pub fn from_header(value: Option<&str>) -> Option<Self> {
        match value? {
            "Issue Hook" => Some(Self::Issue),
            "Note Hook" => Some(Self::Note),
            "Merge Request Hook" => Some(Self::MergeRequest),
            _ => None,
        }
    }

    /// Short name used when archiving payloads
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Note => "note",
            Self::MergeRequest => "merge_request",
        }
    }
}

/// The extractor an event is dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    IssueAssignee,
    MergeRequestNote,
    MergeRequestReviewer,
}

/// Pick the extractor for a parsed event.
///
/// Notes are only relayed when attached to a merge request; the error carries
/// the reason returned to the sender.
pub fn route_event(kind: EventKind, payload: &Value) -> Result<Route, String> {
    match kind {
        EventKind::Issue => Ok(Route::IssueAssignee),
        EventKind::MergeRequest => Ok(Route::MergeRequestReviewer),
        EventKind::Note => {
            let noteable_type = payload
                .pointer("/object_attributes/noteable_type")
                .and_then(Value::as_str);
            match noteable_type {
                Some("MergeRequest") => Ok(Route::MergeRequestNote),
                other => Err(format!(
                    "Note on {} not supported",
                    other.unwrap_or("unknown")
                )),
            }
        }
    }
}

/// Render a JSON value as a pipeline variable string.
///
/// Null becomes an empty string; numbers and booleans use their JSON text.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Read the value at a JSON pointer as a string, empty when absent
pub fn text_at(payload: &Value, pointer: &str) -> String {
    payload.pointer(pointer).map(stringify).unwrap_or_default()
}

/// First non-empty value among several JSON pointers
pub fn first_text(payload: &Value, pointers: &[&str]) -> String {
    pointers
        .iter()
        .map(|p| text_at(payload, p))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// Usernames listed under `changes.<field>.current`, in payload order
pub fn current_usernames(payload: &Value, field: &str) -> Vec<String> {
    payload
        .pointer(&format!("/changes/{}/current", field))
        .and_then(Value::as_array)
        .map(|users| {
            users
                .iter()
                .map(|u| u.get("username").map(stringify).unwrap_or_default())
                .collect()
        })
        .unwrap_or_default()
}
