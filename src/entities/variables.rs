//! CI/CD variables of groups and projects.
//!
//! The variables API takes form-encoded bodies. When several variables share
//! a key, `filter[environment_scope]` selects which one an action targets.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{deleted, Collection};
use crate::config::SchemaMode;
use crate::error::Result;
use crate::gitlab::{ApiPath, HttpRequest};
use crate::params::{payload, query_pairs, Encoding};
use crate::tools::{ActionInput, ActionSchema, ToolContext, ToolDefinition};

pub const BROWSE_TOOL: &str = "browse_variables";
pub const MANAGE_TOOL: &str = "manage_variable";
const FEATURE_FLAG: &str = "USE_VARIABLES";

const VARIABLES: Collection = Collection::new("variables");
const ROUTING: &[&str] = &["namespace", "key", "filter_environment_scope"];
const SCOPE_FILTER: &str = "filter[environment_scope]";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    EnvVar,
    File,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListVariables {
    /// Group or project path or numeric ID
    pub namespace: String,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct VariableRef {
    /// Group or project path or numeric ID
    pub namespace: String,
    /// Variable key
    pub key: String,
    /// Environment scope of the variable when the key is defined more than once
    pub environment_scope: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateVariable {
    /// Group or project path or numeric ID
    pub namespace: String,
    /// Variable key; letters, digits and `_` only
    pub key: String,
    pub value: String,
    pub variable_type: Option<VariableType>,
    pub protected: Option<bool>,
    pub masked: Option<bool>,
    /// Treat the value as raw, without variable expansion
    pub raw: Option<bool>,
    /// Environment scope, `*` for all environments
    pub environment_scope: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateVariable {
    /// Group or project path or numeric ID
    pub namespace: String,
    /// Variable key
    pub key: String,
    pub value: Option<String>,
    pub variable_type: Option<VariableType>,
    pub protected: Option<bool>,
    pub masked: Option<bool>,
    pub raw: Option<bool>,
    /// New environment scope
    pub environment_scope: Option<String>,
    /// Environment scope of the variable to update when the key is defined more than once
    pub filter_environment_scope: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BrowseVariables {
    List(ListVariables),
    Get(VariableRef),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ManageVariable {
    Create(CreateVariable),
    Update(UpdateVariable),
    Delete(VariableRef),
}

fn scoped(request: HttpRequest, scope: Option<&str>) -> HttpRequest {
    match scope {
        Some(scope) => request.with_param(SCOPE_FILTER, scope),
        None => request,
    }
}

#[async_trait]
impl ActionInput for BrowseVariables {
    fn actions() -> Vec<ActionSchema> {
        vec![
            ActionSchema::of::<ListVariables>("list", "List variables of a group or project"),
            ActionSchema::of::<VariableRef>("get", "Get a single variable"),
        ]
    }

    async fn execute(self, ctx: &ToolContext) -> Result<Value> {
        match self {
            BrowseVariables::List(input) => {
                let ns = ctx.resolve(&input.namespace).await;
                let query = query_pairs(&input, ROUTING)?;
                ctx.send(VARIABLES.list(ApiPath::namespace(&ns), query))
                    .await
            }
            BrowseVariables::Get(input) => {
                let ns = ctx.resolve(&input.namespace).await;
                let request = VARIABLES.get(ApiPath::namespace(&ns), &input.key);
                ctx.send(scoped(request, input.environment_scope.as_deref()))
                    .await
            }
        }
    }
}

#[async_trait]
impl ActionInput for ManageVariable {
    fn actions() -> Vec<ActionSchema> {
        vec![
            ActionSchema::of::<CreateVariable>("create", "Create a variable"),
            ActionSchema::of::<UpdateVariable>("update", "Update a variable"),
            ActionSchema::of::<VariableRef>("delete", "Delete a variable"),
        ]
    }

    async fn execute(self, ctx: &ToolContext) -> Result<Value> {
        match self {
            ManageVariable::Create(input) => {
                let ns = ctx.resolve(&input.namespace).await;
                let body = payload(&input, &["namespace"], Encoding::Form)?;
                ctx.send(VARIABLES.create(ApiPath::namespace(&ns), body))
                    .await
            }
            ManageVariable::Update(input) => {
                let ns = ctx.resolve(&input.namespace).await;
                let body = payload(&input, ROUTING, Encoding::Form)?;
                let request = VARIABLES.update(ApiPath::namespace(&ns), &input.key, body);
                ctx.send(scoped(request, input.filter_environment_scope.as_deref()))
                    .await
            }
            ManageVariable::Delete(input) => {
                let ns = ctx.resolve(&input.namespace).await;
                let request = VARIABLES.delete(ApiPath::namespace(&ns), &input.key);
                ctx.execute(scoped(request, input.environment_scope.as_deref()))
                    .await?;
                Ok(deleted())
            }
        }
    }
}

pub fn tools(mode: SchemaMode) -> Result<Vec<ToolDefinition>> {
    Ok(vec![
        ToolDefinition::for_actions::<BrowseVariables>(
            BROWSE_TOOL,
            "Browse CI/CD variables of a group or project: list, get",
            true,
            mode,
        )?
        .feature(FEATURE_FLAG),
        ToolDefinition::for_actions::<ManageVariable>(
            MANAGE_TOOL,
            "Create, update or delete CI/CD variables of a group or project",
            false,
            mode,
        )?
        .feature(FEATURE_FLAG),
    ])
}
