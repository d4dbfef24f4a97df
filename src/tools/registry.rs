use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info};

use super::{ToolContext, ToolDefinition};
use crate::config::Config;
use crate::entities;
use crate::error::{GitlabMcpError, Result};

const SUGGESTION_THRESHOLD: f64 = 0.85;

/// Ordered set of tools with lookup by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: ToolDefinition) -> Result<()> {
        if self.index.contains_key(tool.name) {
            return Err(GitlabMcpError::Config(format!(
                "tool '{}' registered twice",
                tool.name
            )));
        }
        self.index.insert(tool.name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn call(&self, ctx: &ToolContext, name: &str, args: Value) -> Result<Value> {
        let Some(tool) = self.get(name) else {
            return Err(GitlabMcpError::UnknownTool {
                name: name.to_string(),
                suggestion: self.suggest(name),
            });
        };
        tool.call(ctx, args).await
    }

    /// Closest registered name, if any is similar enough.
    fn suggest(&self, name: &str) -> Option<String> {
        self.tools
            .iter()
            .map(|t| (t.name, strsim::jaro_winkler(name, t.name)))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(name, _)| name.to_string())
    }
}

/// Collects every entity's tools, minus those switched off by configuration.
///
/// Feature flags drop whole entity groups; read-only mode drops every tool
/// that can modify GitLab state.
pub fn build_registry(config: &Config) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for tool in entities::all_tools(config.schema_mode)? {
        if !tool.is_enabled(config) {
            debug!(tool = tool.name, "tool disabled by feature flag");
            continue;
        }
        if config.read_only && !tool.read_only {
            debug!(tool = tool.name, "tool hidden in read-only mode");
            continue;
        }
        registry.register(tool)?;
    }
    info!(tools = registry.len(), read_only = config.read_only, "tool registry built");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::testing::MockGitlab;

    #[test]
    fn test_default_registry_has_every_tool() {
        let registry = build_registry(&Config::default()).unwrap();
        assert_eq!(registry.len(), 12);
        assert!(registry.get("browse_milestones").is_some());
        assert!(registry.get("manage_time_tracking").is_some());
    }

    #[test]
    fn test_read_only_keeps_only_browse_tools() {
        let mut config = Config::default();
        config.read_only = true;
        let registry = build_registry(&config).unwrap();
        assert!(registry.iter().all(|t| t.read_only));
        assert!(registry.names().iter().all(|n| n.starts_with("browse_")));
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ToolRegistry::new();
        for tool in entities::labels::tools(Default::default()).unwrap() {
            registry.register(tool).unwrap();
        }
        let again = entities::labels::tools(Default::default()).unwrap();
        let err = registry.register(again.into_iter().next().unwrap()).unwrap_err();
        assert!(err.to_string().contains("registered twice"));
    }

    #[tokio::test]
    async fn test_unknown_tool_suggests_closest() {
        let registry = build_registry(&Config::default()).unwrap();
        let ctx = ToolContext::new(
            Arc::new(MockGitlab::new()),
            Arc::new(Config::default()),
        );
        let err = registry
            .call(&ctx, "browse_milestone", serde_json::json!({}))
            .await
            .unwrap_err();
        match err {
            GitlabMcpError::UnknownTool { suggestion, .. } => {
                assert_eq!(suggestion.as_deref(), Some("browse_milestones"))
            }
            other => panic!("expected unknown tool, got {:?}", other),
        }

        let err = registry
            .call(&ctx, "zzz", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GitlabMcpError::UnknownTool {
                suggestion: None,
                ..
            }
        ));
    }
}
