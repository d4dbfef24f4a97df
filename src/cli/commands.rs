use std::future::Future;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{info, warn};

use gitlab_mcp::config::Config;
use gitlab_mcp::error::{GitlabMcpError, Result};
use gitlab_mcp::gate::{AvailabilityGate, Tier};
use gitlab_mcp::gitlab::{detect_instance, InstanceState, RestClient, Transport};
use gitlab_mcp::session::Session;
use gitlab_mcp::tools::{build_registry, ToolContext};

#[derive(Parser)]
#[command(name = "gitlab-mcp")]
#[command(about = "MCP server exposing GitLab milestones, variables, labels, merge requests, issues and time tracking")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Serve MCP over stdio
    GITLAB_PERSONAL_ACCESS_TOKEN=glpat-... gitlab-mcp serve

    # List the tools the current configuration exposes
    gitlab-mcp tools

    # Invoke one tool directly
    gitlab-mcp call browse_milestones --args '{"action":"list","namespace":"my-group"}'

    # Show the detected instance version and tier
    gitlab-mcp instance
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// GitLab base URL (overrides GITLAB_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Personal access token (overrides GITLAB_PERSONAL_ACCESS_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Hide every tool that can modify GitLab state
    #[arg(long, global = true)]
    pub read_only: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start MCP server on stdio
    Serve,

    /// List registered tools
    Tools {
        /// Print full tool definitions, including input schemas, as JSON
        #[arg(long)]
        json: bool,
    },

    /// Invoke a tool once and print its result
    Call {
        /// Tool name
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },

    /// Detect GitLab version and tier
    Instance,
}

impl Cli {
    /// Environment configuration with command-line overrides applied.
    pub fn config(&self) -> Result<Config> {
        let mut config = Config::from_env()?;
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(token) = &self.token {
            config.token = Some(token.clone());
        }
        if self.read_only {
            config.read_only = true;
        }
        Ok(config)
    }
}

fn connect(config: &Config) -> Result<Arc<dyn Transport>> {
    let session = Session::from_config(config)?;
    Ok(Arc::new(RestClient::new(config, session)?))
}

/// Runs instance detection, then `on_settled` once the state is no longer pending.
async fn detect_then<F, Fut>(
    instance: Arc<InstanceState>,
    transport: Arc<dyn Transport>,
    tier_override: Option<Tier>,
    on_settled: F,
) where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    instance.detect(transport.as_ref(), tier_override).await;
    on_settled().await;
}

pub async fn run_mcp_server(config: Config) -> Result<()> {
    use crate::mcp::McpServer;
    use rmcp::ServiceExt;

    let transport = connect(&config)?;
    let instance = Arc::new(InstanceState::pending());
    let tier_override = config.tier_override;

    info!(api = %config.api_root(), read_only = config.read_only, "starting MCP server");
    let server = McpServer::new(Arc::new(config), transport.clone(), instance.clone())?;

    let stdio = (tokio::io::stdin(), tokio::io::stdout());
    let service = server
        .serve(stdio)
        .await
        .map_err(|e| GitlabMcpError::Mcp(e.to_string()))?;

    // Tools listed while detection was pending may now be gated off.
    let peer = service.peer().clone();
    tokio::spawn(detect_then(instance, transport, tier_override, move || async move {
        if let Err(e) = peer.notify_tool_list_changed().await {
            warn!(error = %e, "failed to announce tool list change");
        }
    }));

    service
        .waiting()
        .await
        .map_err(|e| GitlabMcpError::Mcp(e.to_string()))?;

    Ok(())
}

pub fn list_tools(config: &Config, as_json: bool) -> Result<()> {
    let registry = build_registry(config)?;

    if as_json {
        let tools: Vec<Value> = registry
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "read_only": tool.read_only,
                    "actions": tool.actions,
                    "input_schema": tool.input_schema.as_ref(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    if registry.is_empty() {
        println!("No tools enabled by the current configuration");
        return Ok(());
    }
    for tool in registry.iter() {
        let mode = if tool.read_only { "read" } else { "write" };
        println!(
            "{:<24} [{}] {}",
            tool.name,
            mode,
            tool.actions.join(", ")
        );
    }
    Ok(())
}

pub async fn call_tool(config: Config, tool: &str, args: &str) -> Result<()> {
    let args: Value = serde_json::from_str(args)?;
    let registry = build_registry(&config)?;
    let transport = connect(&config)?;

    let instance = Arc::new(InstanceState::pending());
    instance.detect(transport.as_ref(), config.tier_override).await;

    let ctx = ToolContext::new(transport, Arc::new(config))
        .with_gate(AvailabilityGate::new(instance));
    let result = registry.call(&ctx, tool, args).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub async fn show_instance(config: &Config) -> Result<()> {
    let transport = connect(config)?;
    let info = detect_instance(transport.as_ref(), config.tier_override).await?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_call_command() {
        let cli = Cli::parse_from([
            "gitlab-mcp",
            "--read-only",
            "call",
            "browse_labels",
            "--args",
            r#"{"action":"list","namespace":"g"}"#,
        ]);
        assert!(cli.read_only);
        match cli.command {
            Commands::Call { tool, args } => {
                assert_eq!(tool, "browse_labels");
                assert!(args.contains("\"list\""));
            }
            _ => panic!("expected call command"),
        }
    }

    struct Unreachable;

    #[async_trait::async_trait]
    impl Transport for Unreachable {
        async fn send(
            &self,
            _request: gitlab_mcp::gitlab::HttpRequest,
        ) -> Result<gitlab_mcp::gitlab::HttpResponse> {
            Err(GitlabMcpError::Mcp("connection refused".to_string()))
        }

        async fn graphql(&self, _query: &str, _variables: Value) -> Result<Value> {
            Err(GitlabMcpError::Mcp("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_settled_callback_runs_after_detection() {
        use gitlab_mcp::gitlab::{InstanceError, InstanceInfoSource};
        use std::sync::atomic::{AtomicBool, Ordering};

        let instance = Arc::new(InstanceState::pending());
        let settled = Arc::new(AtomicBool::new(false));
        let observed = instance.clone();
        let flag = settled.clone();

        detect_then(instance, Arc::new(Unreachable), None, move || async move {
            assert!(matches!(
                observed.instance_info(),
                Err(InstanceError::Lookup(_))
            ));
            flag.store(true, Ordering::SeqCst);
        })
        .await;

        assert!(settled.load(Ordering::SeqCst));
    }

    #[test]
    fn test_tools_json_flag() {
        let cli = Cli::parse_from(["gitlab-mcp", "tools", "--json"]);
        assert!(matches!(cli.command, Commands::Tools { json: true }));
    }
}
