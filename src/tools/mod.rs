//! Consolidated browse/manage tools.
//!
//! Each tool is an action-discriminated input type ([`ActionInput`]) wrapped
//! in an [`ActionTool`], which runs every call through the same pipeline:
//! validate -> parse -> policy check -> availability gate -> execute.

pub mod registry;
pub mod schema;
pub mod validation;

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{Config, SchemaMode};
use crate::error::{FieldIssue, GitlabMcpError, Result};
use crate::gate::AvailabilityGate;
use crate::gitlab::{HttpRequest, Transport};
use crate::namespace::{resolve_namespace, ResolvedNamespace};

pub use registry::{build_registry, ToolRegistry};
pub use validation::{ActionSchema, InputValidator};

/// Everything a handler needs for one invocation.
#[derive(Clone)]
pub struct ToolContext {
    pub transport: Arc<dyn Transport>,
    pub config: Arc<Config>,
    pub gate: Option<AvailabilityGate>,
}

impl ToolContext {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<Config>) -> Self {
        Self {
            transport,
            config,
            gate: None,
        }
    }

    pub fn with_gate(mut self, gate: AvailabilityGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Sends a request, fails on non-2xx, and returns the JSON body.
    pub async fn send(&self, request: HttpRequest) -> Result<Value> {
        self.transport.send(request).await?.error_for_status()?.json()
    }

    /// Sends a request and fails on non-2xx, ignoring the response body.
    pub async fn execute(&self, request: HttpRequest) -> Result<()> {
        self.transport.send(request).await?.error_for_status()?;
        Ok(())
    }

    pub async fn resolve(&self, namespace: &str) -> ResolvedNamespace {
        resolve_namespace(self.transport.as_ref(), namespace).await
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value>;
}

/// A tagged union of per-action inputs, keyed by `action`.
#[async_trait]
pub trait ActionInput: DeserializeOwned + Send + 'static {
    /// Schemas of every action, in the order they are presented to clients.
    fn actions() -> Vec<ActionSchema>;

    async fn execute(self, ctx: &ToolContext) -> Result<Value>;
}

pub struct ActionTool<I> {
    tool: &'static str,
    validator: InputValidator,
    _input: PhantomData<fn() -> I>,
}

impl<I: ActionInput> ActionTool<I> {
    pub fn new(tool: &'static str) -> Result<Self> {
        Ok(Self {
            tool,
            validator: InputValidator::new(tool, I::actions())?,
            _input: PhantomData,
        })
    }

    pub fn validator(&self) -> &InputValidator {
        &self.validator
    }
}

#[async_trait]
impl<I: ActionInput> ToolHandler for ActionTool<I> {
    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let action = self.validator.validate(&args)?.name;

        let input: I = serde_json::from_value(args).map_err(|e| {
            GitlabMcpError::validation(self.tool, vec![FieldIssue::root(e.to_string())])
        })?;

        if ctx.config.is_denied(self.tool, action) {
            return Err(GitlabMcpError::PolicyDenied {
                tool: self.tool.to_string(),
                action: action.to_string(),
            });
        }
        if let Some(gate) = &ctx.gate {
            if !gate.is_available(self.tool, Some(action)) {
                return Err(GitlabMcpError::Unavailable {
                    tool: self.tool.to_string(),
                    action: Some(action.to_string()),
                });
            }
        }

        debug!(tool = self.tool, action, "dispatching tool call");
        input.execute(ctx).await
    }
}

/// Environment flag that switches a tool on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureGate {
    pub env_flag: &'static str,
    pub default_enabled: bool,
}

impl FeatureGate {
    pub fn is_enabled(&self, config: &Config) -> bool {
        config.feature(self.env_flag).unwrap_or(self.default_enabled)
    }
}

pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub read_only: bool,
    pub feature: Option<FeatureGate>,
    pub actions: Vec<&'static str>,
    pub input_schema: Arc<Map<String, Value>>,
    handler: Arc<dyn ToolHandler>,
}

impl ToolDefinition {
    pub fn for_actions<I: ActionInput>(
        name: &'static str,
        description: &'static str,
        read_only: bool,
        mode: SchemaMode,
    ) -> Result<Self> {
        let tool = ActionTool::<I>::new(name)?;
        let input_schema = Arc::new(schema::render(tool.validator().actions(), mode));
        let actions = tool.validator().actions().iter().map(|a| a.name).collect();
        Ok(Self {
            name,
            description,
            read_only,
            feature: None,
            actions,
            input_schema,
            handler: Arc::new(tool),
        })
    }

    /// Ties the tool to a `USE_<ENTITY>` flag that defaults to enabled.
    pub fn feature(mut self, env_flag: &'static str) -> Self {
        self.feature = Some(FeatureGate {
            env_flag,
            default_enabled: true,
        });
        self
    }

    pub fn is_enabled(&self, config: &Config) -> bool {
        self.feature.map_or(true, |f| f.is_enabled(config))
    }

    pub async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        self.handler.call(ctx, args).await
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("read_only", &self.read_only)
            .field("feature", &self.feature)
            .field("actions", &self.actions)
            .finish()
    }
}
