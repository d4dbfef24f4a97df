//! Labels of groups and projects.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{deleted, Collection};
use crate::config::SchemaMode;
use crate::error::Result;
use crate::gitlab::ApiPath;
use crate::params::{payload, query_pairs, Encoding};
use crate::tools::{ActionInput, ActionSchema, ToolContext, ToolDefinition};

pub const BROWSE_TOOL: &str = "browse_labels";
pub const MANAGE_TOOL: &str = "manage_label";
const FEATURE_FLAG: &str = "USE_LABELS";

const LABELS: Collection = Collection::new("labels");
const ROUTING: &[&str] = &["namespace", "label_id"];

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListLabels {
    /// Group or project path or numeric ID
    pub namespace: String,
    /// Include issue and merge request counts
    pub with_counts: Option<bool>,
    /// Include labels inherited from ancestor groups
    pub include_ancestor_groups: Option<bool>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct LabelRef {
    /// Group or project path or numeric ID
    pub namespace: String,
    /// Label ID or name
    pub label_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateLabel {
    /// Group or project path or numeric ID
    pub namespace: String,
    pub name: String,
    /// `#RRGGBB` or a CSS color name
    pub color: String,
    pub description: Option<String>,
    /// Priority; lower numbers sort first
    pub priority: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateLabel {
    /// Group or project path or numeric ID
    pub namespace: String,
    /// Label ID or name
    pub label_id: String,
    pub new_name: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub priority: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BrowseLabels {
    List(ListLabels),
    Get(LabelRef),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ManageLabel {
    Create(CreateLabel),
    Update(UpdateLabel),
    Delete(LabelRef),
}

#[async_trait]
impl ActionInput for BrowseLabels {
    fn actions() -> Vec<ActionSchema> {
        vec![
            ActionSchema::of::<ListLabels>("list", "List labels of a group or project"),
            ActionSchema::of::<LabelRef>("get", "Get a single label by ID or name"),
        ]
    }

    async fn execute(self, ctx: &ToolContext) -> Result<Value> {
        match self {
            BrowseLabels::List(input) => {
                let ns = ctx.resolve(&input.namespace).await;
                let query = query_pairs(&input, ROUTING)?;
                ctx.send(LABELS.list(ApiPath::namespace(&ns), query)).await
            }
            BrowseLabels::Get(input) => {
                let ns = ctx.resolve(&input.namespace).await;
                ctx.send(LABELS.get(ApiPath::namespace(&ns), &input.label_id))
                    .await
            }
        }
    }
}

#[async_trait]
impl ActionInput for ManageLabel {
    fn actions() -> Vec<ActionSchema> {
        vec![
            ActionSchema::of::<CreateLabel>("create", "Create a label"),
            ActionSchema::of::<UpdateLabel>("update", "Update a label"),
            ActionSchema::of::<LabelRef>("delete", "Delete a label"),
        ]
    }

    async fn execute(self, ctx: &ToolContext) -> Result<Value> {
        match self {
            ManageLabel::Create(input) => {
                let ns = ctx.resolve(&input.namespace).await;
                let body = payload(&input, ROUTING, Encoding::Json)?;
                ctx.send(LABELS.create(ApiPath::namespace(&ns), body)).await
            }
            ManageLabel::Update(input) => {
                let ns = ctx.resolve(&input.namespace).await;
                let body = payload(&input, ROUTING, Encoding::Json)?;
                ctx.send(LABELS.update(ApiPath::namespace(&ns), &input.label_id, body))
                    .await
            }
            ManageLabel::Delete(input) => {
                let ns = ctx.resolve(&input.namespace).await;
                ctx.execute(LABELS.delete(ApiPath::namespace(&ns), &input.label_id))
                    .await?;
                Ok(deleted())
            }
        }
    }
}

pub fn tools(mode: SchemaMode) -> Result<Vec<ToolDefinition>> {
    Ok(vec![
        ToolDefinition::for_actions::<BrowseLabels>(
            BROWSE_TOOL,
            "Browse labels of a group or project: list, get",
            true,
            mode,
        )?
        .feature(FEATURE_FLAG),
        ToolDefinition::for_actions::<ManageLabel>(
            MANAGE_TOOL,
            "Create, update or delete labels of a group or project",
            false,
            mode,
        )?
        .feature(FEATURE_FLAG),
    ])
}
