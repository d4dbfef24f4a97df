use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{HttpRequest, HttpResponse, Method, Payload, Transport};
use crate::config::Config;
use crate::error::{GitlabMcpError, Result};
use crate::session::Session;

/// reqwest-backed [`Transport`] bound to one instance and one session.
pub struct RestClient {
    http: reqwest::Client,
    root: String,
    session: Session,
}

impl RestClient {
    pub fn new(config: &Config, session: Session) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("gitlab-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let root = config.api_root();
        reqwest::Url::parse(&root)
            .map_err(|e| GitlabMcpError::Config(format!("GITLAB_API_URL '{}': {}", root, e)))?;

        Ok(Self {
            http,
            root,
            session,
        })
    }

    fn parse(&self, url: String) -> Result<reqwest::Url> {
        reqwest::Url::parse(&url)
            .map_err(|e| GitlabMcpError::Config(format!("request URL '{}': {}", url, e)))
    }

    fn rest_url(&self, path: &str) -> Result<reqwest::Url> {
        self.parse(format!("{}/api/v4/{}", self.root, path.trim_start_matches('/')))
    }

    fn graphql_url(&self) -> Result<reqwest::Url> {
        self.parse(format!("{}/api/graphql", self.root))
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for RestClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(method = request.method.as_str(), path = %request.path, "GitLab request");

        let url = self.rest_url(&request.path)?;
        let mut builder = self.http.request(to_reqwest(request.method), url.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match &request.body {
            Payload::Empty => builder,
            Payload::Form(pairs) => builder.form(pairs),
            Payload::Json(value) => builder.json(value),
        };
        builder = self.session.authorize(builder, &url);

        let response = builder.send().await?;
        let status = response.status().as_u16();
        Ok(HttpResponse::new(status, response.text().await?))
    }

    async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let url = self.graphql_url()?;
        let builder = self
            .http
            .post(url.clone())
            .json(&json!({ "query": query, "variables": variables }));
        let response = self.session.authorize(builder, &url).send().await?;
        let status = response.status().as_u16();
        let response = HttpResponse::new(status, response.text().await?).error_for_status()?;
        let mut value = response.json()?;

        if let Some(message) = value
            .pointer("/errors/0/message")
            .and_then(Value::as_str)
        {
            return Err(GitlabMcpError::Http {
                status: response.status,
                status_text: response.status_text.clone(),
                message: Some(message.to_string()),
            });
        }
        Ok(value.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Credentials;

    #[test]
    fn test_urls() {
        let mut config = Config::default();
        config.api_url = "https://git.example.com/api/v4/".to_string();
        let client = RestClient::new(&config, Session::new(Credentials::Anonymous)).unwrap();
        assert_eq!(
            client.rest_url("projects/g%2Fp/milestones").unwrap().as_str(),
            "https://git.example.com/api/v4/projects/g%2Fp/milestones"
        );
        assert_eq!(
            client.graphql_url().unwrap().as_str(),
            "https://git.example.com/api/graphql"
        );
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let mut config = Config::default();
        config.api_url = "not a url".to_string();
        let err = RestClient::new(&config, Session::new(Credentials::Anonymous))
            .err()
            .unwrap();
        assert!(matches!(err, GitlabMcpError::Config(_)));
    }
}
