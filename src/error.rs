use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// One failing field in a tool input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub path: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn root(message: impl Into<String>) -> Self {
        Self::new("", message)
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn action_suffix(action: &Option<String>) -> String {
    action
        .as_ref()
        .map(|a| format!(" (action '{}')", a))
        .unwrap_or_default()
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_ref()
        .map(|m| format!(": {}", m))
        .unwrap_or_default()
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!("; did you mean '{}'?", s))
        .unwrap_or_default()
}

#[derive(Error, Debug)]
pub enum GitlabMcpError {
    #[error("invalid input for {tool}: {}", join_issues(.issues))]
    Validation {
        tool: String,
        issues: Vec<FieldIssue>,
    },

    #[error("action '{action}' of tool '{tool}' is denied by policy")]
    PolicyDenied { tool: String, action: String },

    #[error("tool '{tool}'{} is not available on this GitLab instance", action_suffix(.action))]
    Unavailable {
        tool: String,
        action: Option<String>,
    },

    #[error("GitLab API error {status} {status_text}{}", message_suffix(.message))]
    Http {
        status: u16,
        status_text: String,
        message: Option<String>,
    },

    #[error("{0}")]
    Ambiguous(String),

    #[error("unknown tool '{name}'{}", suggestion_suffix(.suggestion))]
    UnknownTool {
        name: String,
        suggestion: Option<String>,
    },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid duration: {0}")]
    Duration(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("MCP error: {0}")]
    Mcp(String),
}

impl GitlabMcpError {
    pub fn validation(tool: impl Into<String>, issues: Vec<FieldIssue>) -> Self {
        GitlabMcpError::Validation {
            tool: tool.into(),
            issues,
        }
    }

    /// HTTP status of an upstream failure, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            GitlabMcpError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

pub type Result<T> = std::result::Result<T, GitlabMcpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_lists_every_issue() {
        let err = GitlabMcpError::validation(
            "manage_milestone",
            vec![
                FieldIssue::new("milestone_id", "required for action 'update'"),
                FieldIssue::new("due_date", "42 is not of type \"string\""),
            ],
        );
        let text = err.to_string();
        assert!(text.starts_with("invalid input for manage_milestone: "));
        assert!(text.contains("milestone_id: required for action 'update'"));
        assert!(text.contains("due_date: 42 is not of type"));
    }

    #[test]
    fn test_http_error_without_message_is_bare_status_line() {
        let err = GitlabMcpError::Http {
            status: 502,
            status_text: "Bad Gateway".to_string(),
            message: None,
        };
        assert_eq!(err.to_string(), "GitLab API error 502 Bad Gateway");
        assert_eq!(err.status(), Some(502));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_unknown_tool_suggestion() {
        let err = GitlabMcpError::UnknownTool {
            name: "browse_milestone".to_string(),
            suggestion: Some("browse_milestones".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "unknown tool 'browse_milestone'; did you mean 'browse_milestones'?"
        );
    }
}
