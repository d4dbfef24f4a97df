//! Project issues.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{deleted, Collection};
use crate::config::SchemaMode;
use crate::error::Result;
use crate::gitlab::{ApiPath, Payload};
use crate::params::{payload, query_pairs, Encoding};
use crate::tools::{ActionInput, ActionSchema, ToolContext, ToolDefinition};

pub const BROWSE_TOOL: &str = "browse_issues";
pub const MANAGE_TOOL: &str = "manage_issue";
const FEATURE_FLAG: &str = "USE_WORKITEMS";

pub(crate) const ISSUES: Collection = Collection::new("issues");
const ROUTING: &[&str] = &["project_id", "issue_iid"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Opened,
    Closed,
    All,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListIssues {
    /// Project path (`group/project`) or numeric ID
    pub project_id: String,
    pub state: Option<IssueState>,
    /// Only issues carrying all of these labels
    pub labels: Option<Vec<String>>,
    /// Milestone title
    pub milestone: Option<String>,
    pub assignee_username: Option<String>,
    pub author_username: Option<String>,
    pub search: Option<String>,
    pub confidential: Option<bool>,
    /// `created_at`, `updated_at`, `due_date` or `priority`
    pub order_by: Option<String>,
    /// `asc` or `desc`
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct IssueRef {
    /// Project path or numeric ID
    pub project_id: String,
    /// Issue IID as shown in the UI
    pub issue_iid: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateIssue {
    /// Project path or numeric ID
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub labels: Option<Vec<String>>,
    pub assignee_ids: Option<Vec<u64>>,
    pub milestone_id: Option<u64>,
    /// YYYY-MM-DD
    pub due_date: Option<String>,
    pub confidential: Option<bool>,
    pub weight: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateIssue {
    /// Project path or numeric ID
    pub project_id: String,
    /// Issue IID
    pub issue_iid: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Replaces all labels
    pub labels: Option<Vec<String>>,
    pub add_labels: Option<Vec<String>>,
    pub remove_labels: Option<Vec<String>>,
    pub assignee_ids: Option<Vec<u64>>,
    pub milestone_id: Option<u64>,
    /// YYYY-MM-DD
    pub due_date: Option<String>,
    pub confidential: Option<bool>,
    pub weight: Option<u32>,
    pub discussion_locked: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BrowseIssues {
    List(ListIssues),
    Get(IssueRef),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ManageIssue {
    Create(CreateIssue),
    Update(UpdateIssue),
    Close(IssueRef),
    Reopen(IssueRef),
    Delete(IssueRef),
}

async fn transition(ctx: &ToolContext, input: &IssueRef, event: &str) -> Result<Value> {
    let body = Payload::Json(json!({ "state_event": event }));
    ctx.send(ISSUES.update(ApiPath::project(&input.project_id), &input.issue_iid, body))
        .await
}

#[async_trait]
impl ActionInput for BrowseIssues {
    fn actions() -> Vec<ActionSchema> {
        vec![
            ActionSchema::of::<ListIssues>("list", "List issues of a project"),
            ActionSchema::of::<IssueRef>("get", "Get a single issue"),
        ]
    }

    async fn execute(self, ctx: &ToolContext) -> Result<Value> {
        match self {
            BrowseIssues::List(input) => {
                let query = query_pairs(&input, ROUTING)?;
                ctx.send(ISSUES.list(ApiPath::project(&input.project_id), query))
                    .await
            }
            BrowseIssues::Get(input) => {
                ctx.send(ISSUES.get(ApiPath::project(&input.project_id), &input.issue_iid))
                    .await
            }
        }
    }
}

#[async_trait]
impl ActionInput for ManageIssue {
    fn actions() -> Vec<ActionSchema> {
        vec![
            ActionSchema::of::<CreateIssue>("create", "Create an issue"),
            ActionSchema::of::<UpdateIssue>("update", "Update an issue"),
            ActionSchema::of::<IssueRef>("close", "Close an issue"),
            ActionSchema::of::<IssueRef>("reopen", "Reopen a closed issue"),
            ActionSchema::of::<IssueRef>("delete", "Delete an issue (administrators and owners only)"),
        ]
    }

    async fn execute(self, ctx: &ToolContext) -> Result<Value> {
        match self {
            ManageIssue::Create(input) => {
                let body = payload(&input, ROUTING, Encoding::Json)?;
                ctx.send(ISSUES.create(ApiPath::project(&input.project_id), body))
                    .await
            }
            ManageIssue::Update(input) => {
                let body = payload(&input, ROUTING, Encoding::Json)?;
                ctx.send(ISSUES.update(
                    ApiPath::project(&input.project_id),
                    &input.issue_iid,
                    body,
                ))
                .await
            }
            ManageIssue::Close(input) => transition(ctx, &input, "close").await,
            ManageIssue::Reopen(input) => transition(ctx, &input, "reopen").await,
            ManageIssue::Delete(input) => {
                ctx.execute(ISSUES.delete(ApiPath::project(&input.project_id), &input.issue_iid))
                    .await?;
                Ok(deleted())
            }
        }
    }
}

pub fn tools(mode: SchemaMode) -> Result<Vec<ToolDefinition>> {
    Ok(vec![
        ToolDefinition::for_actions::<BrowseIssues>(
            BROWSE_TOOL,
            "Browse issues of a project: list, get",
            true,
            mode,
        )?
        .feature(FEATURE_FLAG),
        ToolDefinition::for_actions::<ManageIssue>(
            MANAGE_TOOL,
            "Create, update, close, reopen or delete issues",
            false,
            mode,
        )?
        .feature(FEATURE_FLAG),
    ])
}
