//! Client for the GitLab pipeline trigger API

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::Settings;
use crate::error::Result;
use crate::extract::PipelineVariables;

pub const TRIGGER_TIMEOUT: Duration = Duration::from_secs(15);

/// Fields read back from a successful trigger response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TriggeredPipeline {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("Pipeline trigger request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("{body}")]
    Upstream { status: u16, body: String },

    #[error("Pipeline trigger returned an unreadable response: {0}")]
    InvalidResponse(String),
}

impl TriggerError {
    /// HTTP status to report back to the webhook sender
    pub fn status(&self) -> u16 {
        match self {
            Self::Upstream { status, .. } => *status,
            Self::Transport(_) | Self::InvalidResponse(_) => 502,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TriggerClient {
    http: reqwest::Client,
    trigger_url: String,
    token: String,
    pipeline_ref: String,
}

impl TriggerClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(TRIGGER_TIMEOUT).build()?;
        Ok(Self {
            http,
            trigger_url: trigger_url(&settings.gitlab_api_base, &settings.pipeline_project_id),
            token: settings.pipeline_trigger_token.clone(),
            pipeline_ref: settings.pipeline_ref.clone(),
        })
    }

    pub fn trigger_url(&self) -> &str {
        &self.trigger_url
    }

    /// Start a pipeline run carrying `variables`
    pub async fn trigger(
        &self,
        variables: &PipelineVariables,
    ) -> std::result::Result<TriggeredPipeline, TriggerError> {
        let form = build_form(&self.token, &self.pipeline_ref, variables);

        debug!(
            "Trigger URL={} ref={} variable_keys={:?}",
            self.trigger_url,
            self.pipeline_ref,
            variables.keys().collect::<Vec<_>>()
        );
        info!(
            "Triggering pipeline (ref={}) for {} project={}",
            self.pipeline_ref,
            variables.get("TRIGGER_TYPE").map(String::as_str).unwrap_or("unknown"),
            variables.get("TARGET_PROJECT_ID").map(String::as_str).unwrap_or("")
        );

        let response = self
            .http
            .post(&self.trigger_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!("Pipeline trigger HTTP request failed: {}", e);
                TriggerError::Transport(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read pipeline trigger response: {}", e);
            TriggerError::Transport(e)
        })?;

        if status.as_u16() >= 300 {
            error!("Pipeline trigger failed ({}): {}", status, body);
            let body = if body.is_empty() {
                "Failed to trigger pipeline".to_string()
            } else {
                body
            };
            return Err(TriggerError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let pipeline: TriggeredPipeline = serde_json::from_str(&body).map_err(|e| {
            error!("Pipeline trigger response was not valid JSON: {}", e);
            TriggerError::InvalidResponse(e.to_string())
        })?;
        info!(
            "Pipeline {:?} queued at {:?}",
            pipeline.id, pipeline.web_url
        );
        Ok(pipeline)
    }
}

fn trigger_url(api_base: &str, project_id: &str) -> String {
    format!(
        "{}/api/v4/projects/{}/trigger/pipeline",
        api_base.trim_end_matches('/'),
        project_id
    )
}

/// Form fields for the trigger call: `token`, `ref` and one `variables[NAME]` per variable
pub fn build_form(
    token: &str,
    pipeline_ref: &str,
    variables: &PipelineVariables,
) -> Vec<(String, String)> {
    let mut form = vec![
        ("token".to_string(), token.to_string()),
        ("ref".to_string(), pipeline_ref.to_string()),
    ];
    form.extend(
        variables
            .iter()
            .map(|(name, value)| (format!("variables[{}]", name), value.clone())),
    );
    form
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_trigger_url_without_double_slash() {
        assert_eq!(
            trigger_url("https://gitlab.com/", "42"),
            "https://gitlab.com/api/v4/projects/42/trigger/pipeline"
        );
        assert_eq!(
            trigger_url("http://127.0.0.1:9000", "group%2Fproj"),
            "http://127.0.0.1:9000/api/v4/projects/group%2Fproj/trigger/pipeline"
        );
    }

    #[test]
    fn form_uses_bracketed_variable_keys() {
        let mut vars = PipelineVariables::new();
        vars.insert("TRIGGER_TYPE", "issue_assignee".to_string());
        vars.insert("TARGET_ISSUE_IID", "3".to_string());

        let form = build_form("tok", "main", &vars);
        assert_eq!(form[0], ("token".to_string(), "tok".to_string()));
        assert_eq!(form[1], ("ref".to_string(), "main".to_string()));
        assert!(form.contains(&("variables[TARGET_ISSUE_IID]".to_string(), "3".to_string())));
        assert!(form.contains(&("variables[TRIGGER_TYPE]".to_string(), "issue_assignee".to_string())));
        assert_eq!(form.len(), 4);
    }

    #[test]
    fn upstream_error_mirrors_status() {
        let err = TriggerError::Upstream {
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(err.status(), 404);
        assert_eq!(err.to_string(), "not found");
        assert_eq!(TriggerError::InvalidResponse("eof".to_string()).status(), 502);
    }

    #[test]
    fn parses_pipeline_response() {
        let body = r#"{"id": 1234, "web_url": "https://x/p/1234", "ref": "main", "status": "created"}"#;
        let pipeline: TriggeredPipeline = serde_json::from_str(body).unwrap();
        assert_eq!(pipeline.id, Some(1234));
        assert_eq!(pipeline.git_ref.as_deref(), Some("main"));
    }
}
