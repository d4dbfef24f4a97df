//! HTTP plumbing towards the GitLab REST and GraphQL APIs.
//!
//! Everything above this module talks to GitLab through the [`Transport`]
//! trait, so handlers can be exercised against a recording transport.

pub mod client;
pub mod instance;
pub mod path;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{GitlabMcpError, Result};

pub use client::RestClient;
pub use instance::{detect_instance, InstanceError, InstanceInfo, InstanceInfoSource, InstanceState};
pub use path::ApiPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// Request body encodings GitLab endpoints accept.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Form(Vec<(String, String)>),
    Json(Value),
}

/// A request relative to the REST API root (`api/v4/`).
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Payload,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: Payload::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query.extend(query);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Payload) -> Self {
        self.body = body;
        self
    }

    /// Value of a query parameter, if present.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl HttpResponse {
    /// Builds a response with the canonical reason phrase for `status`.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or_default();
        Self {
            status,
            status_text: status_text.to_string(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body as JSON; an empty body (e.g. `204 No Content`) is `null`.
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Turns a non-2xx response into an [`GitlabMcpError::Http`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(GitlabMcpError::Http {
            status: self.status,
            status_text: self.status_text.clone(),
            message: upstream_message(&self.body),
        })
    }
}

/// Best-effort extraction of GitLab's error message from a response body.
///
/// JSON bodies yield their `message` or `error` field, plain text is kept
/// as-is, and empty or HTML bodies (error pages from proxies) yield `None` so
/// the error degrades to the bare status line.
fn upstream_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed.starts_with('<') {
        return None;
    }
    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return Some(truncate_for_error(trimmed));
    };
    let message = match &value {
        Value::Object(map) => match map.get("message").or_else(|| map.get("error")) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => value.to_string(),
        },
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Some(truncate_for_error(&message))
}

fn truncate_for_error(value: &str) -> String {
    const LIMIT: usize = 400;
    if value.len() <= LIMIT {
        return value.to_string();
    }
    let mut end = LIMIT;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &value[..end])
}

/// Outbound access to a GitLab instance.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a REST request. Non-2xx statuses are returned, not raised.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Runs a GraphQL query and returns its `data` member.
    async fn graphql(&self, query: &str, variables: Value) -> Result<Value>;
}
