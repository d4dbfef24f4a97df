//! Project merge requests.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::Collection;
use crate::config::SchemaMode;
use crate::error::{GitlabMcpError, Result};
use crate::gitlab::{ApiPath, HttpRequest, Payload};
use crate::params::{payload, query_pairs, Encoding};
use crate::tools::{ActionInput, ActionSchema, ToolContext, ToolDefinition};

pub const BROWSE_TOOL: &str = "browse_merge_requests";
pub const MANAGE_TOOL: &str = "manage_merge_request";
const FEATURE_FLAG: &str = "USE_MRS";

const MERGE_REQUESTS: Collection = Collection::new("merge_requests");
const ROUTING: &[&str] = &["project_id", "merge_request_iid"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MergeRequestState {
    Opened,
    Closed,
    Locked,
    Merged,
    All,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MergeRequestStateEvent {
    Close,
    Reopen,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PositionType {
    #[default]
    Text,
    Image,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListMergeRequests {
    /// Project path (`group/project`) or numeric ID
    pub project_id: String,
    pub state: Option<MergeRequestState>,
    /// Only merge requests carrying all of these labels
    pub labels: Option<Vec<String>>,
    /// Milestone title
    pub milestone: Option<String>,
    pub author_username: Option<String>,
    pub reviewer_username: Option<String>,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
    pub search: Option<String>,
    /// `created_at`, `updated_at` or `title`
    pub order_by: Option<String>,
    /// `asc` or `desc`
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetMergeRequest {
    /// Project path or numeric ID
    pub project_id: String,
    /// Merge request IID; takes precedence over `source_branch`
    pub merge_request_iid: Option<String>,
    /// Look the merge request up by its source branch instead
    pub source_branch: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MergeRequestPage {
    /// Project path or numeric ID
    pub project_id: String,
    /// Merge request IID
    pub merge_request_iid: String,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateMergeRequest {
    /// Project path or numeric ID
    pub project_id: String,
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    pub description: Option<String>,
    pub labels: Option<Vec<String>>,
    pub assignee_ids: Option<Vec<u64>>,
    pub reviewer_ids: Option<Vec<u64>>,
    pub milestone_id: Option<u64>,
    pub remove_source_branch: Option<bool>,
    pub squash: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateMergeRequest {
    /// Project path or numeric ID
    pub project_id: String,
    /// Merge request IID
    pub merge_request_iid: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_branch: Option<String>,
    /// Replaces all labels
    pub labels: Option<Vec<String>>,
    pub add_labels: Option<Vec<String>>,
    pub remove_labels: Option<Vec<String>>,
    pub assignee_ids: Option<Vec<u64>>,
    pub reviewer_ids: Option<Vec<u64>>,
    pub milestone_id: Option<u64>,
    pub state_event: Option<MergeRequestStateEvent>,
    pub remove_source_branch: Option<bool>,
    pub squash: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MergeMergeRequest {
    /// Project path or numeric ID
    pub project_id: String,
    /// Merge request IID
    pub merge_request_iid: String,
    pub merge_commit_message: Option<String>,
    pub squash_commit_message: Option<String>,
    pub squash: Option<bool>,
    pub should_remove_source_branch: Option<bool>,
    /// Merge only if the head is still at this SHA
    pub sha: Option<String>,
}

/// Location of a diff comment.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DiffPosition {
    pub base_sha: String,
    pub start_sha: String,
    pub head_sha: String,
    #[serde(default)]
    pub position_type: PositionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_line: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CommentOnMergeRequest {
    /// Project path or numeric ID
    pub project_id: String,
    /// Merge request IID
    pub merge_request_iid: String,
    /// Comment text (Markdown)
    pub body: String,
    /// Anchor the comment to a diff line; starts a new discussion
    pub position: Option<DiffPosition>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BrowseMergeRequests {
    List(ListMergeRequests),
    Get(GetMergeRequest),
    Diffs(MergeRequestPage),
    Discussions(MergeRequestPage),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ManageMergeRequest {
    Create(CreateMergeRequest),
    Update(UpdateMergeRequest),
    Merge(MergeMergeRequest),
    Comment(CommentOnMergeRequest),
}

async fn get_merge_request(ctx: &ToolContext, input: GetMergeRequest) -> Result<Value> {
    let project = ApiPath::project(&input.project_id);
    match (input.merge_request_iid, input.source_branch) {
        (Some(iid), _) => ctx.send(MERGE_REQUESTS.get(project, &iid)).await,
        (None, Some(branch)) => {
            let request =
                MERGE_REQUESTS.list(project, vec![("source_branch".to_string(), branch.clone())]);
            let found = ctx.send(request).await?;
            found
                .as_array()
                .and_then(|items| items.first())
                .cloned()
                .ok_or_else(|| {
                    GitlabMcpError::Ambiguous(format!(
                        "no merge request found for source branch '{}'",
                        branch
                    ))
                })
        }
        (None, None) => Err(GitlabMcpError::Ambiguous(
            "either merge_request_iid or source_branch is required".to_string(),
        )),
    }
}

#[async_trait]
impl ActionInput for BrowseMergeRequests {
    fn actions() -> Vec<ActionSchema> {
        vec![
            ActionSchema::of::<ListMergeRequests>("list", "List merge requests of a project"),
            ActionSchema::of::<GetMergeRequest>(
                "get",
                "Get a merge request by IID or by source branch",
            ),
            ActionSchema::of::<MergeRequestPage>("diffs", "File diffs of a merge request"),
            ActionSchema::of::<MergeRequestPage>(
                "discussions",
                "Discussion threads of a merge request",
            ),
        ]
    }

    async fn execute(self, ctx: &ToolContext) -> Result<Value> {
        match self {
            BrowseMergeRequests::List(input) => {
                let query = query_pairs(&input, ROUTING)?;
                ctx.send(MERGE_REQUESTS.list(ApiPath::project(&input.project_id), query))
                    .await
            }
            BrowseMergeRequests::Get(input) => get_merge_request(ctx, input).await,
            BrowseMergeRequests::Diffs(input) => {
                let path = MERGE_REQUESTS
                    .item(ApiPath::project(&input.project_id), &input.merge_request_iid)
                    .push("diffs");
                let query = query_pairs(&input, ROUTING)?;
                ctx.send(HttpRequest::get(path).with_query(query)).await
            }
            BrowseMergeRequests::Discussions(input) => {
                let path = MERGE_REQUESTS
                    .item(ApiPath::project(&input.project_id), &input.merge_request_iid)
                    .push("discussions");
                let query = query_pairs(&input, ROUTING)?;
                ctx.send(HttpRequest::get(path).with_query(query)).await
            }
        }
    }
}

#[async_trait]
impl ActionInput for ManageMergeRequest {
    fn actions() -> Vec<ActionSchema> {
        vec![
            ActionSchema::of::<CreateMergeRequest>("create", "Open a merge request"),
            ActionSchema::of::<UpdateMergeRequest>("update", "Update a merge request"),
            ActionSchema::of::<MergeMergeRequest>("merge", "Accept and merge a merge request"),
            ActionSchema::of::<CommentOnMergeRequest>(
                "comment",
                "Comment on a merge request, optionally on a diff line",
            ),
        ]
    }

    async fn execute(self, ctx: &ToolContext) -> Result<Value> {
        match self {
            ManageMergeRequest::Create(input) => {
                let body = payload(&input, ROUTING, Encoding::Json)?;
                ctx.send(MERGE_REQUESTS.create(ApiPath::project(&input.project_id), body))
                    .await
            }
            ManageMergeRequest::Update(input) => {
                let body = payload(&input, ROUTING, Encoding::Json)?;
                ctx.send(MERGE_REQUESTS.update(
                    ApiPath::project(&input.project_id),
                    &input.merge_request_iid,
                    body,
                ))
                .await
            }
            ManageMergeRequest::Merge(input) => {
                let path = MERGE_REQUESTS
                    .item(ApiPath::project(&input.project_id), &input.merge_request_iid)
                    .push("merge");
                let body = payload(&input, ROUTING, Encoding::Json)?;
                ctx.send(HttpRequest::put(path).with_body(body)).await
            }
            ManageMergeRequest::Comment(input) => {
                let item = MERGE_REQUESTS
                    .item(ApiPath::project(&input.project_id), &input.merge_request_iid);
                let request = match &input.position {
                    Some(position) => HttpRequest::post(item.push("discussions")).with_body(
                        Payload::Json(json!({ "body": input.body, "position": position })),
                    ),
                    None => HttpRequest::post(item.push("notes"))
                        .with_body(Payload::Json(json!({ "body": input.body }))),
                };
                ctx.send(request).await
            }
        }
    }
}

pub fn tools(mode: SchemaMode) -> Result<Vec<ToolDefinition>> {
    Ok(vec![
        ToolDefinition::for_actions::<BrowseMergeRequests>(
            BROWSE_TOOL,
            "Browse merge requests of a project: list, get, diffs, discussions",
            true,
            mode,
        )?
        .feature(FEATURE_FLAG),
        ToolDefinition::for_actions::<ManageMergeRequest>(
            MANAGE_TOOL,
            "Create, update, merge or comment on merge requests",
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

    use crate::config::Config;
    use crate::gitlab::Method;
    use crate::testing::MockGitlab;

    fn context(transport: Arc<MockGitlab>) -> ToolContext {
        ToolContext::new(transport, Arc::new(Config::default()))
    }

    #[tokio::test]
    async fn test_get_by_source_branch_takes_first_match() {
        let transport = Arc::new(MockGitlab::new().on(
            Method::Get,
            "projects/g%2Fp/merge_requests",
            200,
            r#"[{"iid":12},{"iid":9}]"#,
        ));
        let tools = tools(SchemaMode::default()).unwrap();
        let result = tools[0]
            .call(
                &context(transport.clone()),
                json!({"action": "get", "project_id": "g/p", "source_branch": "feature/x"}),
            )
            .await
            .unwrap();
        assert_eq!(result, json!({"iid": 12}));
        assert_eq!(
            transport.requests()[0].query_value("source_branch"),
            Some("feature/x")
        );
    }

    #[tokio::test]
    async fn test_get_by_unknown_branch_is_ambiguous() {
        let transport = Arc::new(MockGitlab::new().on(
            Method::Get,
            "projects/g%2Fp/merge_requests",
            200,
            "[]",
        ));
        let tools = tools(SchemaMode::default()).unwrap();
        let err = tools[0]
            .call(
                &context(transport),
                json!({"action": "get", "project_id": "g/p", "source_branch": "gone"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GitlabMcpError::Ambiguous(_)));
    }

    #[tokio::test]
    async fn test_comment_with_position_starts_discussion() {
        let transport = Arc::new(MockGitlab::new().on(
            Method::Post,
            "projects/7/merge_requests/3/discussions",
            201,
            r#"{"id":"abc"}"#,
        ));
        let tools = tools(SchemaMode::default()).unwrap();
        tools[1]
            .call(
                &context(transport.clone()),
                json!({
                    "action": "comment",
                    "project_id": "7",
                    "merge_request_iid": "3",
                    "body": "nit",
                    "position": {
                        "base_sha": "a", "start_sha": "b", "head_sha": "c",
                        "new_path": "src/lib.rs", "new_line": 10
                    }
                }),
            )
            .await
            .unwrap();

        let request = transport.requests().pop().unwrap();
        match request.body {
            Payload::Json(body) => {
                assert_eq!(body["position"]["position_type"], "text");
                assert_eq!(body["position"]["new_line"], 10);
            }
            other => panic!("expected JSON body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_plain_comment_is_a_note() {
        let transport = Arc::new(MockGitlab::new().on(
            Method::Post,
            "projects/7/merge_requests/3/notes",
            201,
            r#"{"id":1}"#,
        ));
        let tools = tools(SchemaMode::default()).unwrap();
        let result = tools[1]
            .call(
                &context(transport),
                json!({"action": "comment", "project_id": "7", "merge_request_iid": "3", "body": "LGTM"}),
            )
            .await
            .unwrap();
        assert_eq!(result["id"], 1);
    }
}
