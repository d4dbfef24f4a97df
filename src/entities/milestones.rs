//! Milestones of groups and projects.

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

pub const BROWSE_TOOL: &str = "browse_milestones";
pub const MANAGE_TOOL: &str = "manage_milestone";
const FEATURE_FLAG: &str = "USE_MILESTONE";

const MILESTONES: Collection = Collection::new("milestones");
const ROUTING: &[&str] = &["namespace", "milestone_id"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneState {
    Active,
    Closed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneStateEvent {
    Activate,
    Close,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListMilestones {
    /// Group or project path (`my-group`, `my-group/my-project`) or numeric ID
    pub namespace: String,
    /// Only milestones in this state
    pub state: Option<MilestoneState>,
    /// Exact title match
    pub title: Option<String>,
    /// Search in title and description
    pub search: Option<String>,
    /// Include milestones of ancestor groups
    pub include_ancestors: Option<bool>,
    /// ISO 8601 timestamp; only milestones updated before it
    pub updated_before: Option<String>,
    /// ISO 8601 timestamp; only milestones updated after it
    pub updated_after: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MilestoneRef {
    /// Group or project path or numeric ID
    pub namespace: String,
    /// Milestone ID (not the IID shown in the UI)
    pub milestone_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MilestoneItems {
    /// Group or project path or numeric ID
    pub namespace: String,
    /// Milestone ID
    pub milestone_id: String,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateMilestone {
    /// Group or project path or numeric ID
    pub namespace: String,
    pub title: String,
    pub description: Option<String>,
    /// YYYY-MM-DD
    pub due_date: Option<String>,
    /// YYYY-MM-DD
    pub start_date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateMilestone {
    /// Group or project path or numeric ID
    pub namespace: String,
    /// Milestone ID
    pub milestone_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// YYYY-MM-DD
    pub due_date: Option<String>,
    /// YYYY-MM-DD
    pub start_date: Option<String>,
    /// Close or reopen the milestone
    pub state_event: Option<MilestoneStateEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BrowseMilestones {
    List(ListMilestones),
    Get(MilestoneRef),
    Issues(MilestoneItems),
    MergeRequests(MilestoneItems),
    Burndown(MilestoneRef),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ManageMilestone {
    Create(CreateMilestone),
    Update(UpdateMilestone),
    Delete(MilestoneRef),
    Promote(MilestoneRef),
}

async fn milestone(ctx: &ToolContext, namespace: &str, milestone_id: &str) -> ApiPath {
    let ns = ctx.resolve(namespace).await;
    MILESTONES.item(ApiPath::namespace(&ns), milestone_id)
}

#[async_trait]
impl ActionInput for BrowseMilestones {
    fn actions() -> Vec<ActionSchema> {
        vec![
            ActionSchema::of::<ListMilestones>("list", "List milestones of a group or project"),
            ActionSchema::of::<MilestoneRef>("get", "Get a single milestone"),
            ActionSchema::of::<MilestoneItems>("issues", "Issues assigned to a milestone"),
            ActionSchema::of::<MilestoneItems>(
                "merge_requests",
                "Merge requests assigned to a milestone",
            ),
            ActionSchema::of::<MilestoneRef>(
                "burndown",
                "Burndown chart events of a milestone (Premium)",
            ),
        ]
    }

    async fn execute(self, ctx: &ToolContext) -> Result<Value> {
        match self {
            BrowseMilestones::List(input) => {
                let ns = ctx.resolve(&input.namespace).await;
                let query = query_pairs(&input, ROUTING)?;
                ctx.send(MILESTONES.list(ApiPath::namespace(&ns), query))
                    .await
            }
            BrowseMilestones::Get(input) => {
                let path = milestone(ctx, &input.namespace, &input.milestone_id).await;
                ctx.send(HttpRequest::get(path)).await
            }
            BrowseMilestones::Issues(input) => {
                let path = milestone(ctx, &input.namespace, &input.milestone_id).await;
                let query = query_pairs(&input, ROUTING)?;
                ctx.send(HttpRequest::get(path.push("issues")).with_query(query))
                    .await
            }
            BrowseMilestones::MergeRequests(input) => {
                let path = milestone(ctx, &input.namespace, &input.milestone_id).await;
                let query = query_pairs(&input, ROUTING)?;
                ctx.send(HttpRequest::get(path.push("merge_requests")).with_query(query))
                    .await
            }
            BrowseMilestones::Burndown(input) => {
                let path = milestone(ctx, &input.namespace, &input.milestone_id).await;
                ctx.send(HttpRequest::get(path.push("burndown_events")))
                    .await
            }
        }
    }
}

#[async_trait]
impl ActionInput for ManageMilestone {
    fn actions() -> Vec<ActionSchema> {
        vec![
            ActionSchema::of::<CreateMilestone>("create", "Create a milestone"),
            ActionSchema::of::<UpdateMilestone>("update", "Update a milestone"),
            ActionSchema::of::<MilestoneRef>("delete", "Delete a milestone"),
            ActionSchema::of::<MilestoneRef>(
                "promote",
                "Promote a project milestone to a group milestone",
            ),
        ]
    }

    async fn execute(self, ctx: &ToolContext) -> Result<Value> {
        match self {
            ManageMilestone::Create(input) => {
                let ns = ctx.resolve(&input.namespace).await;
                let body = payload(&input, ROUTING, Encoding::Json)?;
                ctx.send(MILESTONES.create(ApiPath::namespace(&ns), body))
                    .await
            }
            ManageMilestone::Update(input) => {
                let ns = ctx.resolve(&input.namespace).await;
                let body = payload(&input, ROUTING, Encoding::Json)?;
                ctx.send(MILESTONES.update(ApiPath::namespace(&ns), &input.milestone_id, body))
                    .await
            }
            ManageMilestone::Delete(input) => {
                let ns = ctx.resolve(&input.namespace).await;
                ctx.execute(MILESTONES.delete(ApiPath::namespace(&ns), &input.milestone_id))
                    .await?;
                Ok(deleted())
            }
            ManageMilestone::Promote(input) => {
                let path = milestone(ctx, &input.namespace, &input.milestone_id).await;
                ctx.send(HttpRequest::post(path.push("promote"))).await
            }
        }
    }
}

pub fn tools(mode: SchemaMode) -> Result<Vec<ToolDefinition>> {
    Ok(vec![
        ToolDefinition::for_actions::<BrowseMilestones>(
            BROWSE_TOOL,
            "Browse GitLab milestones: list, get, issues, merge_requests, burndown",
            true,
            mode,
        )?
        .feature(FEATURE_FLAG),
        ToolDefinition::for_actions::<ManageMilestone>(
            MANAGE_TOOL,
            "Create, update, delete or promote GitLab milestones",
            false,
            mode,
        )?
        .feature(FEATURE_FLAG),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::config::Config;
    use crate::gitlab::Method;
    use crate::testing::MockGitlab;

    fn context(transport: Arc<MockGitlab>) -> ToolContext {
        ToolContext::new(transport, Arc::new(Config::default()))
    }

    #[tokio::test]
    async fn test_list_forwards_filters() {
        let transport = Arc::new(
            MockGitlab::new()
                .on(Method::Get, "groups/g", 200, r#"{"id":1}"#)
                .on(Method::Get, "groups/g/milestones", 200, "[]"),
        );
        let tools = tools(SchemaMode::default()).unwrap();
        let result = tools[0]
            .call(
                &context(transport.clone()),
                json!({"action": "list", "namespace": "g", "state": "active"}),
            )
            .await
            .unwrap();
        assert_eq!(result, json!([]));

        let requests = transport.requests();
        let list = requests.last().unwrap();
        assert_eq!(list.query_value("state"), Some("active"));
        assert_eq!(list.query_value("namespace"), None);
    }

    #[tokio::test]
    async fn test_promote_posts_to_project_milestone() {
        let transport = Arc::new(
            MockGitlab::new()
                .on(Method::Get, "projects/g%2Fp", 200, r#"{"id":9}"#)
                .on(Method::Post, "projects/g%2Fp/milestones/3/promote", 200, r#"{"id":3}"#),
        );
        let tools = tools(SchemaMode::default()).unwrap();
        tools[1]
            .call(
                &context(transport.clone()),
                json!({"action": "promote", "namespace": "g/p", "milestone_id": "3"}),
            )
            .await
            .unwrap();

        let last = transport.requests().pop().unwrap();
        assert_eq!(last.method, Method::Post);
    }

    #[tokio::test]
    async fn test_update_sends_json_body_without_routing_fields() {
        let transport = Arc::new(
            MockGitlab::new()
                .on(Method::Get, "groups/g", 200, r#"{"id":1}"#)
                .on(Method::Put, "groups/g/milestones/5", 200, r#"{"id":5}"#),
        );
        let tools = tools(SchemaMode::default()).unwrap();
        tools[1]
            .call(
                &context(transport.clone()),
                json!({"action": "update", "namespace": "g", "milestone_id": "5", "state_event": "close"}),
            )
            .await
            .unwrap();

        let last = transport.requests().pop().unwrap();
        assert_eq!(
            last.body,
            crate::gitlab::Payload::Json(json!({"state_event": "close"}))
        );
    }
}
