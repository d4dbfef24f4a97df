mod cli;
mod mcp;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the MCP protocol; logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gitlab_mcp=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;

    match cli.command {
        Commands::Serve => {
            cli::run_mcp_server(config).await?;
        }
        Commands::Tools { json } => {
            cli::list_tools(&config, json)?;
        }
        Commands::Call { tool, args } => {
            cli::call_tool(config, &tool, &args).await?;
        }
        Commands::Instance => {
            cli::show_instance(&config).await?;
        }
    }

    Ok(())
}
