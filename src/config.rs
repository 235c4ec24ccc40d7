//! Environment-sourced runtime settings

use std::path::PathBuf;

use crate::error::{RelayError, Result};
use crate::extract::TRUNCATION_MARKER;

pub const DEFAULT_PIPELINE_REF: &str = "main";
pub const DEFAULT_API_BASE: &str = "https://gitlab.com";
pub const DEFAULT_FALLBACK_BRANCH: &str = "main";
pub const DEFAULT_ORIGINAL_NEEDS_MAX_CHARS: usize = 8192;
pub const DEFAULT_AGENT_USERNAME: &str = "copilot-agent";
pub const DEFAULT_AGENT_COMMIT_EMAIL: &str = "copilot@github.com";
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";
pub const DEFAULT_LISTEN_PORT: u16 = 8080;
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_HOOKS_DIR: &str = "hooks";

/// Settings resolved once at startup and shared read-only by every request.
#[derive(Debug, Clone)]
pub struct Settings {
    pub pipeline_trigger_token: String,
    pub pipeline_project_id: String,
    pub pipeline_ref: String,
    pub gitlab_api_base: String,
    pub webhook_secret_token: Option<String>,
    pub fallback_target_branch: String,
    pub original_needs_max_chars: usize,
    pub agent_username: String,
    pub agent_commit_email: String,
    pub enable_inline_review_comments: bool,
    pub listen_host: String,
    pub listen_port: u16,
    pub log_debug: bool,
    pub log_dir: PathBuf,
    pub hooks_dir: PathBuf,
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary key lookup.
    ///
    /// Empty values are treated the same as absent ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let get_or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());
        let require = |name: &str| get(name).ok_or_else(|| RelayError::MissingVariable(name.to_string()));

        let original_needs_max_chars = match get("ORIGINAL_NEEDS_MAX_CHARS") {
            Some(raw) => parse_number::<usize>("ORIGINAL_NEEDS_MAX_CHARS", &raw)?,
            None => DEFAULT_ORIGINAL_NEEDS_MAX_CHARS,
        };
        let marker_len = TRUNCATION_MARKER.chars().count();
        if original_needs_max_chars < marker_len {
            return Err(RelayError::InvalidVariable {
                name: "ORIGINAL_NEEDS_MAX_CHARS".to_string(),
                message: format!("must be at least {}", marker_len),
            });
        }

        let listen_port = match get("LISTEN_PORT") {
            Some(raw) => parse_number::<u16>("LISTEN_PORT", &raw)?,
            None => DEFAULT_LISTEN_PORT,
        };

        Ok(Self {
            pipeline_trigger_token: require("PIPELINE_TRIGGER_TOKEN")?,
            pipeline_project_id: require("PIPELINE_PROJECT_ID")?,
            pipeline_ref: get_or("PIPELINE_REF", DEFAULT_PIPELINE_REF),
            gitlab_api_base: get_or("GITLAB_API_BASE", DEFAULT_API_BASE),
            webhook_secret_token: get("WEBHOOK_SECRET_TOKEN"),
            fallback_target_branch: get_or("FALLBACK_TARGET_BRANCH", DEFAULT_FALLBACK_BRANCH),
            original_needs_max_chars,
            agent_username: get_or("COPILOT_AGENT_USERNAME", DEFAULT_AGENT_USERNAME),
            agent_commit_email: get_or("COPILOT_AGENT_COMMIT_EMAIL", DEFAULT_AGENT_COMMIT_EMAIL),
            enable_inline_review_comments: get("ENABLE_INLINE_REVIEW_COMMENTS")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
            listen_host: get_or("LISTEN_HOST", DEFAULT_LISTEN_HOST),
            listen_port,
            log_debug: get("LOG_DEBUG").map(|v| parse_flag(&v)).unwrap_or(false),
            log_dir: PathBuf::from(get_or("LOG_DIR", DEFAULT_LOG_DIR)),
            hooks_dir: PathBuf::from(get_or("HOOKS_DIR", DEFAULT_HOOKS_DIR)),
        })
    }

    /// Socket address string the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }

    /// The `@username` token that addresses the agent in free text
    pub fn agent_mention(&self) -> String {
        format!("@{}", self.agent_username)
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn parse_number<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| RelayError::InvalidVariable {
        name: name.to_string(),
        message: format!("'{}' ({})", raw, e),
    })
}
