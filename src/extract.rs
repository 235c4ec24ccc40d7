//! Projection of webhook payloads into pipeline trigger variables

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::Settings;
use crate::webhook::{Route, current_usernames, first_text, text_at};

/// Appended to `ORIGINAL_NEEDS` when the issue description is cut short
pub const TRUNCATION_MARKER: &str = "\n\n<!-- truncated -->";

const ALLOWED_ACTIONS: [&str; 4] = ["open", "reopen", "update", "edited"];

/// Variable name to value, sent as `variables[NAME]=value`
pub type PipelineVariables = BTreeMap<&'static str, String>;

/// Why an event was not relayed. The message is returned to the sender.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Ignoring unsupported issue action '{0}'")]
    UnsupportedIssueAction(String),

    #[error("Ignoring unsupported MR action '{0}'")]
    UnsupportedMergeRequestAction(String),

    #[error("{0} not assigned, ignoring event")]
    AgentNotAssigned(String),

    #[error("{0} not assigned as reviewer, ignoring event")]
    AgentNotReviewer(String),

    #[error("{0} not mentioned in note")]
    AgentNotMentioned(String),

    #[error("Missing required {subject} fields: {}", .fields.join(", "))]
    MissingFields {
        subject: &'static str,
        fields: Vec<&'static str>,
    },
}

/// Run the extractor selected for an event
pub fn extract(
    route: Route,
    payload: &Value,
    settings: &Settings,
) -> Result<PipelineVariables, Rejection> {
    match route {
        Route::IssueAssignee => extract_issue(payload, settings),
        Route::MergeRequestNote => extract_mr_note(payload, settings),
        Route::MergeRequestReviewer => extract_mr_reviewer(payload, settings),
    }
}

/// Issue assigned to the agent.
///
/// Only the first entry of `changes.assignees.current` is considered.
pub fn extract_issue(payload: &Value, settings: &Settings) -> Result<PipelineVariables, Rejection> {
    let action = text_at(payload, "/object_attributes/action").to_lowercase();
    if !ALLOWED_ACTIONS.contains(&action.as_str()) {
        debug!("Ignoring action '{}' (allowed={:?})", action, ALLOWED_ACTIONS);
        return Err(Rejection::UnsupportedIssueAction(action));
    }

    let assignees = current_usernames(payload, "assignees");
    match assignees.first() {
        Some(first) if *first == settings.agent_username => {
            info!("{} assigned detected, will trigger pipeline", settings.agent_username);
        }
        first => {
            if let Some(name) = first {
                debug!("First assignee is '{}', not '{}'", name, settings.agent_username);
            }
            info!(
                "{} not assigned in changes, skipping pipeline trigger",
                settings.agent_username
            );
            return Err(Rejection::AgentNotAssigned(settings.agent_username.clone()));
        }
    }

    let original_needs = truncate_needs(
        &text_at(payload, "/object_attributes/description"),
        settings.original_needs_max_chars,
    );

    let target_branch = match first_text(
        payload,
        &["/project/default_branch", "/repository/default_branch"],
    ) {
        b if b.is_empty() => settings.fallback_target_branch.clone(),
        b => b,
    };

    let mut vars = PipelineVariables::new();
    vars.insert("TRIGGER_TYPE", "issue_assignee".to_string());
    vars.insert("ORIGINAL_NEEDS", original_needs);
    vars.insert(
        "TARGET_REPO_URL",
        first_text(
            payload,
            &[
                "/project/http_url",
                "/project/git_http_url",
                "/repository/url",
                "/repository/homepage",
            ],
        ),
    );
    vars.insert("TARGET_BRANCH", target_branch);
    vars.insert(
        "TARGET_PROJECT_ID",
        project_id(payload, "/object_attributes/project_id"),
    );
    vars.insert(
        "TARGET_PROJECT_PATH",
        first_text(payload, &["/project/path_with_namespace", "/repository/name"]),
    );
    vars.insert("TARGET_ISSUE_IID", text_at(payload, "/object_attributes/iid"));
    vars.insert("TARGET_ISSUE_ID", text_at(payload, "/object_attributes/id"));
    vars.insert("ISSUE_AUTHOR_ID", text_at(payload, "/object_attributes/author_id"));
    vars.insert("ISSUE_TITLE", text_at(payload, "/object_attributes/title"));
    vars.insert("ISSUE_URL", text_at(payload, "/object_attributes/url"));
    vars.insert("ISSUE_ACTION", text_at(payload, "/object_attributes/action"));
    vars.insert("ISSUE_STATE", text_at(payload, "/object_attributes/state"));
    vars.insert("ISSUE_UPDATED_AT", text_at(payload, "/object_attributes/updated_at"));
    insert_agent_identity(&mut vars, settings);

    require_fields(
        &vars,
        "issue/project",
        &["TARGET_REPO_URL", "TARGET_PROJECT_ID", "TARGET_ISSUE_IID"],
    )?;

    debug!(
        "Extracted vars action={} project_id={} branch={} repo={}",
        action, vars["TARGET_PROJECT_ID"], vars["TARGET_BRANCH"], vars["TARGET_REPO_URL"]
    );
    Ok(vars)
}

/// Merge request comment that mentions the agent
pub fn extract_mr_note(payload: &Value, settings: &Settings) -> Result<PipelineVariables, Rejection> {
    let note = text_at(payload, "/object_attributes/note");
    let mention = settings.agent_mention();
    if !note.contains(&mention) {
        return Err(Rejection::AgentNotMentioned(mention));
    }
    let instruction = note.replace(&mention, "").trim().to_string();
    let source_branch = text_at(payload, "/merge_request/source_branch");

    let mut vars = PipelineVariables::new();
    vars.insert("TRIGGER_TYPE", "mr_note".to_string());
    vars.insert("MR_NOTE_INSTRUCTION", instruction);
    vars.insert("TARGET_REPO_URL", merge_request_repo_url(payload));
    vars.insert("TARGET_BRANCH", text_at(payload, "/merge_request/target_branch"));
    vars.insert("NEW_BRANCH_NAME", source_branch.clone());
    vars.insert("SOURCE_BRANCH", source_branch);
    vars.insert(
        "TARGET_PROJECT_ID",
        project_id(payload, "/merge_request/target_project_id"),
    );
    vars.insert("TARGET_PROJECT_PATH", text_at(payload, "/project/path_with_namespace"));
    vars.insert("TARGET_MR_IID", text_at(payload, "/merge_request/iid"));
    vars.insert("TARGET_MR_ID", text_at(payload, "/merge_request/id"));
    vars.insert("MR_TITLE", text_at(payload, "/merge_request/title"));
    vars.insert("MR_URL", text_at(payload, "/merge_request/url"));
    vars.insert("MR_AUTHOR_ID", text_at(payload, "/merge_request/author_id"));
    vars.insert("NOTE_AUTHOR_ID", text_at(payload, "/user/id"));
    vars.insert("NOTE_AUTHOR_USERNAME", text_at(payload, "/user/username"));
    insert_agent_identity(&mut vars, settings);

    require_fields(&vars, "MR/project", &MERGE_REQUEST_REQUIRED)?;

    debug!(
        "Extracted MR note vars project_id={} source_branch={} target_branch={} mr_iid={}",
        vars["TARGET_PROJECT_ID"], vars["SOURCE_BRANCH"], vars["TARGET_BRANCH"], vars["TARGET_MR_IID"]
    );
    Ok(vars)
}

/// Agent added as a merge request reviewer.
///
/// Every entry of `changes.reviewers.current` is considered.
pub fn extract_mr_reviewer(
    payload: &Value,
    settings: &Settings,
) -> Result<PipelineVariables, Rejection> {
    let action = text_at(payload, "/object_attributes/action").to_lowercase();
    if !ALLOWED_ACTIONS.contains(&action.as_str()) {
        debug!("Ignoring action '{}' (allowed={:?})", action, ALLOWED_ACTIONS);
        return Err(Rejection::UnsupportedMergeRequestAction(action));
    }

    if !current_usernames(payload, "reviewers")
        .iter()
        .any(|name| *name == settings.agent_username)
    {
        info!(
            "{} not assigned as reviewer in changes, skipping pipeline trigger",
            settings.agent_username
        );
        return Err(Rejection::AgentNotReviewer(settings.agent_username.clone()));
    }
    info!(
        "{} assigned as reviewer detected, will trigger pipeline",
        settings.agent_username
    );

    let mut vars = PipelineVariables::new();
    vars.insert("TRIGGER_TYPE", "mr_reviewer".to_string());
    vars.insert("TARGET_REPO_URL", merge_request_repo_url(payload));
    vars.insert("TARGET_BRANCH", text_at(payload, "/object_attributes/target_branch"));
    vars.insert("SOURCE_BRANCH", text_at(payload, "/object_attributes/source_branch"));
    vars.insert(
        "TARGET_PROJECT_ID",
        project_id(payload, "/object_attributes/target_project_id"),
    );
    vars.insert("TARGET_PROJECT_PATH", text_at(payload, "/project/path_with_namespace"));
    vars.insert("TARGET_MR_IID", text_at(payload, "/object_attributes/iid"));
    vars.insert("TARGET_MR_ID", text_at(payload, "/object_attributes/id"));
    vars.insert("MR_TITLE", text_at(payload, "/object_attributes/title"));
    vars.insert("MR_DESCRIPTION", text_at(payload, "/object_attributes/description"));
    vars.insert("MR_URL", text_at(payload, "/object_attributes/url"));
    vars.insert("MR_AUTHOR_ID", text_at(payload, "/object_attributes/author_id"));
    vars.insert("MR_ACTION", action);
    vars.insert("MR_STATE", text_at(payload, "/object_attributes/state"));
    vars.insert("REVIEWER_ASSIGNER_ID", text_at(payload, "/user/id"));
    vars.insert("REVIEWER_ASSIGNER_USERNAME", text_at(payload, "/user/username"));
    insert_agent_identity(&mut vars, settings);
    vars.insert(
        "ENABLE_INLINE_REVIEW_COMMENTS",
        settings.enable_inline_review_comments.to_string(),
    );

    require_fields(&vars, "MR/project", &MERGE_REQUEST_REQUIRED)?;

    debug!(
        "Extracted MR reviewer vars project_id={} source_branch={} target_branch={} mr_iid={}",
        vars["TARGET_PROJECT_ID"], vars["SOURCE_BRANCH"], vars["TARGET_BRANCH"], vars["TARGET_MR_IID"]
    );
    Ok(vars)
}

/// Cap `text` at `max_chars` characters, ending with [`TRUNCATION_MARKER`] when cut.
pub fn truncate_needs(text: &str, max_chars: usize) -> String {
    let len = text.chars().count();
    if len <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(TRUNCATION_MARKER.chars().count());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    debug!("Original needs truncated to {} chars", truncated.chars().count());
    truncated
}

const MERGE_REQUEST_REQUIRED: [&str; 4] =
    ["TARGET_REPO_URL", "TARGET_PROJECT_ID", "SOURCE_BRANCH", "TARGET_MR_IID"];

/// `project.id`, else the event's own project id field. An id of `0` counts as absent.
fn project_id(payload: &Value, event_pointer: &str) -> String {
    ["/project/id", event_pointer]
        .iter()
        .map(|p| text_at(payload, p))
        .find(|id| !id.is_empty() && id != "0")
        .unwrap_or_default()
}

fn merge_request_repo_url(payload: &Value) -> String {
    first_text(payload, &["/project/http_url", "/project/git_http_url"])
}

fn insert_agent_identity(vars: &mut PipelineVariables, settings: &Settings) {
    vars.insert("COPILOT_AGENT_USERNAME", settings.agent_username.clone());
    vars.insert("COPILOT_AGENT_COMMIT_EMAIL", settings.agent_commit_email.clone());
}

fn require_fields(
    vars: &PipelineVariables,
    subject: &'static str,
    required: &[&'static str],
) -> Result<(), Rejection> {
    let missing: Vec<&'static str> = required
        .iter()
        .copied()
        .filter(|name| vars.get(name).is_none_or(|v| v.is_empty()))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Rejection::MissingFields { subject, fields: missing })
    }
}
