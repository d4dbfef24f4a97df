//! Time estimates and spent time on project issues.
//!
//! Durations use GitLab's human format (`1h30m`, `2d`, `1mo`). Estimate
//! changes report only `{time_estimate, human_time_estimate}`.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::issues::ISSUES;
use crate::batch::process_batch;
use crate::config::SchemaMode;
use crate::duration::{format_duration, parse_duration};
use crate::error::{GitlabMcpError, Result};
use crate::gitlab::{ApiPath, HttpRequest, Payload};
use crate::tools::{ActionInput, ActionSchema, ToolContext, ToolDefinition};

pub const BROWSE_TOOL: &str = "browse_time_tracking";
pub const MANAGE_TOOL: &str = "manage_time_tracking";
const FEATURE_FLAG: &str = "USE_TIME_TRACKING";

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct IssueTime {
    /// Project path (`group/project`) or numeric ID
    pub project_id: String,
    /// Issue IID
    pub issue_iid: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EstimateChange {
    /// Project path or numeric ID
    pub project_id: String,
    /// Issue IID
    pub issue_iid: String,
    /// Human duration such as `3h30m`, `1w2d` or `-30m`; a bare number is seconds
    pub duration: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SpentTime {
    /// Project path or numeric ID
    pub project_id: String,
    /// Issue IID
    pub issue_iid: String,
    /// Human duration; negative values subtract time
    pub duration: String,
    /// Note attached to the time entry
    pub summary: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct BulkEstimate {
    /// Project path or numeric ID
    pub project_id: String,
    /// IIDs of the issues to update
    pub issue_iids: Vec<String>,
    /// Duration added to each issue's current estimate
    pub duration: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BrowseTimeTracking {
    Stats(IssueTime),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ManageTimeTracking {
    SetEstimate(EstimateChange),
    AddEstimate(EstimateChange),
    ResetEstimate(IssueTime),
    AddSpent(SpentTime),
    ResetSpent(IssueTime),
    BulkAddEstimate(BulkEstimate),
}

fn issue(project_id: &str, issue_iid: &str) -> ApiPath {
    ISSUES.item(ApiPath::project(project_id), issue_iid)
}

/// Narrows a time-stats response to the estimate fields.
fn estimate_view(stats: &Value) -> Value {
    json!({
        "time_estimate": stats.get("time_estimate").cloned().unwrap_or(Value::Null),
        "human_time_estimate": stats.get("human_time_estimate").cloned().unwrap_or(Value::Null),
    })
}

fn duration_form(seconds: i64) -> Payload {
    Payload::Form(vec![("duration".to_string(), format_duration(seconds))])
}

async fn set_estimate(ctx: &ToolContext, path: ApiPath, seconds: i64) -> Result<Value> {
    if seconds < 0 {
        return Err(GitlabMcpError::Duration(format!(
            "estimate cannot be negative ({})",
            format_duration(seconds)
        )));
    }
    let request = if seconds == 0 {
        HttpRequest::post(path.push("reset_time_estimate"))
    } else {
        HttpRequest::post(path.push("time_estimate")).with_body(duration_form(seconds))
    };
    Ok(estimate_view(&ctx.send(request).await?))
}

/// Reads the current estimate, then writes back the sum.
async fn add_estimate(
    ctx: &ToolContext,
    project_id: &str,
    issue_iid: &str,
    seconds: i64,
) -> Result<Value> {
    let path = issue(project_id, issue_iid);
    let stats = ctx
        .send(HttpRequest::get(path.clone().push("time_stats")))
        .await?;
    let current = stats
        .get("time_estimate")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let total = current.saturating_add(seconds);
    debug!(issue = issue_iid, current, added = seconds, total, "adding to estimate");
    set_estimate(ctx, path, total).await
}

#[async_trait]
impl ActionInput for BrowseTimeTracking {
    fn actions() -> Vec<ActionSchema> {
        vec![ActionSchema::of::<IssueTime>(
            "stats",
            "Time estimate and time spent on an issue",
        )]
    }

    async fn execute(self, ctx: &ToolContext) -> Result<Value> {
        match self {
            BrowseTimeTracking::Stats(input) => {
                let path = issue(&input.project_id, &input.issue_iid).push("time_stats");
                ctx.send(HttpRequest::get(path)).await
            }
        }
    }
}

#[async_trait]
impl ActionInput for ManageTimeTracking {
    fn actions() -> Vec<ActionSchema> {
        vec![
            ActionSchema::of::<EstimateChange>("set_estimate", "Replace an issue's time estimate"),
            ActionSchema::of::<EstimateChange>(
                "add_estimate",
                "Add to (or subtract from) an issue's time estimate",
            ),
            ActionSchema::of::<IssueTime>("reset_estimate", "Clear an issue's time estimate"),
            ActionSchema::of::<SpentTime>("add_spent", "Log time spent on an issue"),
            ActionSchema::of::<IssueTime>("reset_spent", "Clear all time spent on an issue"),
            ActionSchema::of::<BulkEstimate>(
                "bulk_add_estimate",
                "Add the same duration to the estimates of several issues",
            ),
        ]
    }

    async fn execute(self, ctx: &ToolContext) -> Result<Value> {
        match self {
            ManageTimeTracking::SetEstimate(input) => {
                let seconds = parse_duration(&input.duration)?;
                set_estimate(ctx, issue(&input.project_id, &input.issue_iid), seconds).await
            }
            ManageTimeTracking::AddEstimate(input) => {
                let seconds = parse_duration(&input.duration)?;
                add_estimate(ctx, &input.project_id, &input.issue_iid, seconds).await
            }
            ManageTimeTracking::ResetEstimate(input) => {
                let path = issue(&input.project_id, &input.issue_iid).push("reset_time_estimate");
                Ok(estimate_view(&ctx.send(HttpRequest::post(path)).await?))
            }
            ManageTimeTracking::AddSpent(input) => {
                let seconds = parse_duration(&input.duration)?;
                let mut form = vec![("duration".to_string(), format_duration(seconds))];
                if let Some(summary) = input.summary {
                    form.push(("summary".to_string(), summary));
                }
                let path = issue(&input.project_id, &input.issue_iid).push("add_spent_time");
                ctx.send(HttpRequest::post(path).with_body(Payload::Form(form)))
                    .await
            }
            ManageTimeTracking::ResetSpent(input) => {
                let path = issue(&input.project_id, &input.issue_iid).push("reset_spent_time");
                ctx.send(HttpRequest::post(path)).await
            }
            ManageTimeTracking::BulkAddEstimate(input) => {
                let seconds = parse_duration(&input.duration)?;
                let project_id = input.project_id.as_str();
                let report = process_batch(
                    input.issue_iids,
                    ctx.config.batch_concurrency,
                    |iid: String| async move { add_estimate(ctx, project_id, &iid, seconds).await },
                )
                .await;
                Ok(serde_json::to_value(report)?)
            }
        }
    }
}

pub fn tools(mode: SchemaMode) -> Result<Vec<ToolDefinition>> {
    Ok(vec![
        ToolDefinition::for_actions::<BrowseTimeTracking>(
            BROWSE_TOOL,
            "Show time estimate and time spent on an issue",
            true,
            mode,
        )?
        .feature(FEATURE_FLAG),
        ToolDefinition::for_actions::<ManageTimeTracking>(
            MANAGE_TOOL,
            "Set, add or reset time estimates and time spent on issues",
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
    async fn test_add_estimate_reads_then_writes_sum() {
        let transport = Arc::new(
            MockGitlab::new()
                .on(
                    Method::Get,
                    "projects/g%2Fp/issues/1/time_stats",
                    200,
                    r#"{"time_estimate":3600,"total_time_spent":0}"#,
                )
                .on(
                    Method::Post,
                    "projects/g%2Fp/issues/1/time_estimate",
                    200,
                    r#"{"time_estimate":5400,"human_time_estimate":"1h 30m","total_time_spent":0}"#,
                ),
        );
        let tools = tools(SchemaMode::default()).unwrap();
        let result = tools[1]
            .call(
                &context(transport.clone()),
                json!({"action": "add_estimate", "project_id": "g/p", "issue_iid": "1", "duration": "30m"}),
            )
            .await
            .unwrap();

        assert_eq!(
            result,
            json!({"time_estimate": 5400, "human_time_estimate": "1h 30m"})
        );
        let write = transport.requests().pop().unwrap();
        assert_eq!(
            write.body,
            Payload::Form(vec![("duration".to_string(), "1h30m".to_string())])
        );
    }

    #[tokio::test]
    async fn test_estimate_cannot_go_negative() {
        let transport = Arc::new(MockGitlab::new().on(
            Method::Get,
            "projects/g%2Fp/issues/1/time_stats",
            200,
            r#"{"time_estimate":600}"#,
        ));
        let tools = tools(SchemaMode::default()).unwrap();
        let err = tools[1]
            .call(
                &context(transport.clone()),
                json!({"action": "add_estimate", "project_id": "g/p", "issue_iid": "1", "duration": "-1h"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GitlabMcpError::Duration(_)));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_duration_makes_no_request() {
        let transport = Arc::new(MockGitlab::new());
        let tools = tools(SchemaMode::default()).unwrap();
        let err = tools[1]
            .call(
                &context(transport.clone()),
                json!({"action": "set_estimate", "project_id": "g/p", "issue_iid": "1", "duration": "soon"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GitlabMcpError::Duration(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_add_spent_passes_summary() {
        let transport = Arc::new(MockGitlab::new().on(
            Method::Post,
            "projects/g%2Fp/issues/2/add_spent_time",
            201,
            r#"{"total_time_spent":7200}"#,
        ));
        let tools = tools(SchemaMode::default()).unwrap();
        let result = tools[1]
            .call(
                &context(transport.clone()),
                json!({"action": "add_spent", "project_id": "g/p", "issue_iid": "2", "duration": "2h", "summary": "review"}),
            )
            .await
            .unwrap();
        assert_eq!(result["total_time_spent"], 7200);

        let request = transport.requests().pop().unwrap();
        assert_eq!(
            request.body,
            Payload::Form(vec![
                ("duration".to_string(), "2h".to_string()),
                ("summary".to_string(), "review".to_string()),
            ])
        );
    }
}
