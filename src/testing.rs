//! In-memory GitLab for tests, shared by unit and integration tests
//! (the latter through the `test-util` feature).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;
use crate::error::{GitlabMcpError, Result};
use crate::gitlab::{HttpRequest, HttpResponse, Method, Transport};
use crate::tools::ToolContext;

const NOT_FOUND: &str = r#"{"message":"404 Not Found"}"#;

/// Canned responses keyed by method and path, with every request recorded.
///
/// The query string is not part of the key. Unrouted requests get a `404`
/// with a GitLab-style message body.
#[derive(Default)]
pub struct MockGitlab {
    routes: HashMap<(Method, String), (u16, String)>,
    graphql: Option<Value>,
    unreachable: bool,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockGitlab {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, method: Method, path: &str, status: u16, body: &str) -> Self {
        self.routes
            .insert((method, path.to_string()), (status, body.to_string()));
        self
    }

    /// Makes `path` resolve as a group during namespace resolution.
    pub fn group(self, path: &str) -> Self {
        self.on(Method::Get, &format!("groups/{}", path), 200, r#"{"id":1}"#)
    }

    /// Makes `path` resolve as a project during namespace resolution.
    pub fn project(self, path: &str) -> Self {
        self.on(Method::Get, &format!("projects/{}", path), 200, r#"{"id":2}"#)
    }

    /// Data returned by every GraphQL query.
    pub fn graphql_data(mut self, data: Value) -> Self {
        self.graphql = Some(data);
        self
    }

    /// Every REST request fails at the transport level.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

#[async_trait]
impl Transport for MockGitlab {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let key = (request.method, request.path.clone());
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        if self.unreachable {
            return Err(GitlabMcpError::Mcp("connection refused".to_string()));
        }
        Ok(match self.routes.get(&key) {
            Some((status, body)) => HttpResponse::new(*status, body.as_str()),
            None => HttpResponse::new(404, NOT_FOUND),
        })
    }

    async fn graphql(&self, _query: &str, _variables: Value) -> Result<Value> {
        self.graphql
            .clone()
            .ok_or_else(|| GitlabMcpError::Mcp("graphql is not routed".to_string()))
    }
}

/// Tool context over `gitlab` without an availability gate.
pub fn context(gitlab: &Arc<MockGitlab>, config: Config) -> ToolContext {
    ToolContext::new(gitlab.clone(), Arc::new(config))
}
