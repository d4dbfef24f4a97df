use std::sync::Arc;

use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo, Tool, ToolsCapability,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer};
use serde_json::{json, Value};
use tracing::debug;

use gitlab_mcp::config::Config;
use gitlab_mcp::error::{GitlabMcpError, Result};
use gitlab_mcp::gate::AvailabilityGate;
use gitlab_mcp::gitlab::{InstanceInfoSource, Transport};
use gitlab_mcp::tools::{build_registry, ToolContext, ToolDefinition, ToolRegistry};

#[derive(Clone)]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    ctx: ToolContext,
}

impl McpServer {
    pub fn new(
        config: Arc<Config>,
        transport: Arc<dyn Transport>,
        instance: Arc<dyn InstanceInfoSource>,
    ) -> Result<Self> {
        let registry = Arc::new(build_registry(&config)?);
        let ctx = ToolContext::new(transport, config)
            .with_gate(AvailabilityGate::new(instance));
        Ok(Self { registry, ctx })
    }

    /// Tools the connected instance can run, in registry order.
    fn visible_tools(&self) -> Vec<&ToolDefinition> {
        self.registry
            .iter()
            .filter(|tool| {
                self.ctx
                    .gate
                    .as_ref()
                    .map_or(true, |gate| gate.is_available(tool.name, None))
            })
            .collect()
    }
}

fn describe(tool: &ToolDefinition) -> Tool {
    Tool {
        name: tool.name.into(),
        title: Some(title_case(tool.name)),
        description: Some(tool.description.into()),
        input_schema: tool.input_schema.clone(),
        output_schema: None,
        annotations: None,
        icons: None,
        meta: None,
    }
}

/// `browse_merge_requests` -> `Browse Merge Requests`.
fn title_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Maps a tool outcome onto the protocol.
///
/// Malformed calls (bad input, unknown tool) are protocol errors; everything
/// else, GitLab failures included, is a tool-level error result.
fn to_call_result(outcome: Result<Value>) -> std::result::Result<CallToolResult, McpError> {
    match outcome {
        Ok(value) => {
            let json = serde_json::to_string_pretty(&value).unwrap_or_default();
            Ok(CallToolResult::success(vec![Content::text(json)]))
        }
        Err(GitlabMcpError::Validation { tool, issues }) => {
            let data = json!({ "issues": &issues });
            let message = GitlabMcpError::validation(tool, issues).to_string();
            Err(McpError::invalid_params(message, Some(data)))
        }
        Err(e @ GitlabMcpError::UnknownTool { .. }) => {
            Err(McpError::invalid_params(e.to_string(), None))
        }
        Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(true),
                }),
                ..Default::default()
            },
            server_info: Implementation {
                name: "gitlab-mcp".to_string(),
                title: Some("GitLab MCP".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "GitLab tools grouped by entity. Every tool takes an `action` field \
                 selecting the operation; browse_* tools read, manage_* tools write."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, McpError> {
        let tools = self.visible_tools().into_iter().map(describe).collect();

        Ok(ListToolsResult {
            next_cursor: None,
            tools,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        debug!(tool = %request.name, "call_tool");
        let args = Value::Object(request.arguments.unwrap_or_default());
        let outcome = self.registry.call(&self.ctx, &request.name, args).await;
        to_call_result(outcome)
    }
}
