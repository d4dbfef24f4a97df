//! End-to-end tool dispatch against an in-memory GitLab.
//!
//! Each test drives a registry tool the way an MCP client would and checks
//! both the result and the exact upstream traffic it caused.

use serde_json::json;

use gitlab_mcp::testing::{context, MockGitlab};
use gitlab_mcp::{build_registry, Config, GitlabMcpError, Method, Payload};

// ============================================================================
// Milestones
// ============================================================================

mod milestones {
    use super::*;

    #[tokio::test]
    async fn test_get_project_milestone() {
        let gitlab = MockGitlab::new()
            .project("g%2Fp")
            .on(
                Method::Get,
                "projects/g%2Fp/milestones/7",
                200,
                r#"{"id":7,"title":"v1.0","state":"active"}"#,
            )
            .build();
        let registry = build_registry(&Config::default()).unwrap();

        let result = registry
            .call(
                &context(&gitlab, Config::default()),
                "browse_milestones",
                json!({"action": "get", "namespace": "g/p", "milestone_id": "7"}),
            )
            .await
            .unwrap();

        assert_eq!(result, json!({"id": 7, "title": "v1.0", "state": "active"}));
        assert_eq!(
            gitlab
                .requests_to(Method::Get, "projects/g%2Fp/milestones/7")
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_update_without_id_names_missing_field() {
        let gitlab = MockGitlab::new().build();
        let registry = build_registry(&Config::default()).unwrap();

        let err = registry
            .call(
                &context(&gitlab, Config::default()),
                "manage_milestone",
                json!({"action": "update", "namespace": "g", "title": "x"}),
            )
            .await
            .unwrap_err();

        match err {
            GitlabMcpError::Validation { tool, issues } => {
                assert_eq!(tool, "manage_milestone");
                assert!(issues.iter().any(|i| i.path == "milestone_id"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(gitlab.requests().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_error_carries_status_and_message() {
        let gitlab = MockGitlab::new().group("g").build();
        let registry = build_registry(&Config::default()).unwrap();

        let err = registry
            .call(
                &context(&gitlab, Config::default()),
                "browse_milestones",
                json!({"action": "get", "namespace": "g", "milestone_id": "999"}),
            )
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("404 Not Found"));
    }
}

// ============================================================================
// Variables
// ============================================================================

mod variables {
    use super::*;

    #[tokio::test]
    async fn test_delete_reports_deleted_regardless_of_body() {
        let gitlab = MockGitlab::new()
            .group("g")
            .on(Method::Delete, "groups/g/variables/TOKEN", 200, "not json at all")
            .build();
        let registry = build_registry(&Config::default()).unwrap();

        let result = registry
            .call(
                &context(&gitlab, Config::default()),
                "manage_variable",
                json!({"action": "delete", "namespace": "g", "key": "TOKEN"}),
            )
            .await
            .unwrap();

        assert_eq!(result, json!({"deleted": true}));
        let deletes: Vec<_> = gitlab
            .requests()
            .into_iter()
            .filter(|r| r.method == Method::Delete)
            .collect();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].path, "groups/g/variables/TOKEN");
    }

    #[tokio::test]
    async fn test_denied_action_makes_no_requests() {
        let gitlab = MockGitlab::new().group("g").build();
        let mut config = Config::default();
        config.deny_action("manage_variable", "delete");
        let registry = build_registry(&config).unwrap();

        let err = registry
            .call(
                &context(&gitlab, config),
                "manage_variable",
                json!({"action": "delete", "namespace": "g", "key": "TOKEN"}),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GitlabMcpError::PolicyDenied { .. }));
        assert!(gitlab.requests().is_empty());
    }
}

// ============================================================================
// Merge requests and issues
// ============================================================================

mod merge_requests {
    use super::*;

    #[tokio::test]
    async fn test_get_without_identifier_is_ambiguous() {
        let gitlab = MockGitlab::new().build();
        let registry = build_registry(&Config::default()).unwrap();

        let err = registry
            .call(
                &context(&gitlab, Config::default()),
                "browse_merge_requests",
                json!({"action": "get", "project_id": "g/p"}),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GitlabMcpError::Ambiguous(_)));
        assert!(gitlab.requests().is_empty());
    }

    #[tokio::test]
    async fn test_issue_labels_are_comma_joined() {
        let gitlab = MockGitlab::new()
            .on(Method::Get, "projects/g%2Fp/issues", 200, r#"[{"iid":1}]"#)
            .build();
        let registry = build_registry(&Config::default()).unwrap();

        let result = registry
            .call(
                &context(&gitlab, Config::default()),
                "browse_issues",
                json!({"action": "list", "project_id": "g/p", "labels": ["bug", "backend"], "state": "opened"}),
            )
            .await
            .unwrap();

        assert_eq!(result, json!([{"iid": 1}]));
        let request = &gitlab.requests()[0];
        assert_eq!(request.query_value("labels"), Some("bug,backend"));
        assert_eq!(request.query_value("state"), Some("opened"));
        assert_eq!(request.query_value("project_id"), None);
    }
}

// ============================================================================
// Time tracking
// ============================================================================

mod time_tracking {
    use super::*;

    const STATS: &str = "projects/g%2Fp/issues/1/time_stats";
    const ESTIMATE: &str = "projects/g%2Fp/issues/1/time_estimate";

    #[tokio::test]
    async fn test_add_estimate_sums_with_current_value() {
        let gitlab = MockGitlab::new()
            .on(Method::Get, STATS, 200, r#"{"time_estimate":3600}"#)
            .on(
                Method::Post,
                ESTIMATE,
                200,
                r#"{"time_estimate":5400,"human_time_estimate":"1h 30m","total_time_spent":0}"#,
            )
            .build();
        let registry = build_registry(&Config::default()).unwrap();

        let result = registry
            .call(
                &context(&gitlab, Config::default()),
                "manage_time_tracking",
                json!({"action": "add_estimate", "project_id": "g/p", "issue_iid": "1", "duration": "30m"}),
            )
            .await
            .unwrap();

        assert_eq!(
            result,
            json!({"time_estimate": 5400, "human_time_estimate": "1h 30m"})
        );
        let requests = gitlab.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].path, STATS);
        assert_eq!(
            requests[1].body,
            Payload::Form(vec![("duration".to_string(), "1h30m".to_string())])
        );
    }

    #[tokio::test]
    async fn test_add_estimate_without_baseline() {
        let gitlab = MockGitlab::new()
            .on(Method::Get, STATS, 200, r#"{"time_estimate":null}"#)
            .on(
                Method::Post,
                ESTIMATE,
                200,
                r#"{"time_estimate":7200,"human_time_estimate":"2h"}"#,
            )
            .build();
        let registry = build_registry(&Config::default()).unwrap();

        registry
            .call(
                &context(&gitlab, Config::default()),
                "manage_time_tracking",
                json!({"action": "add_estimate", "project_id": "g/p", "issue_iid": "1", "duration": "2h"}),
            )
            .await
            .unwrap();

        assert_eq!(
            gitlab.requests()[1].body,
            Payload::Form(vec![("duration".to_string(), "2h".to_string())])
        );
    }

    #[tokio::test]
    async fn test_bulk_estimate_reports_each_issue() {
        let gitlab = MockGitlab::new()
            .on(Method::Get, STATS, 200, r#"{"time_estimate":0}"#)
            .on(
                Method::Post,
                ESTIMATE,
                200,
                r#"{"time_estimate":3600,"human_time_estimate":"1h"}"#,
            )
            .build();
        let registry = build_registry(&Config::default()).unwrap();

        let report = registry
            .call(
                &context(&gitlab, Config::default()),
                "manage_time_tracking",
                json!({
                    "action": "bulk_add_estimate",
                    "project_id": "g/p",
                    "issue_iids": ["1", "404"],
                    "duration": "1h"
                }),
            )
            .await
            .unwrap();

        assert_eq!(
            report["summary"],
            json!({"total": 2, "succeeded": 1, "failed": 1})
        );
        assert_eq!(report["results"][0]["id"], "1");
        assert_eq!(report["results"][0]["success"], true);
        assert_eq!(report["results"][1]["id"], "404");
        assert_eq!(report["results"][1]["success"], false);
        assert!(report["results"][1]["error"]
            .as_str()
            .unwrap()
            .contains("404"));
    }
}

// ============================================================================
// Availability gate
// ============================================================================

mod gate {
    use super::*;
    use std::sync::Arc;

    use gitlab_mcp::{AvailabilityGate, InstanceInfo, InstanceState, Tier};

    fn gated(gitlab: &Arc<MockGitlab>, version: &str, tier: Tier) -> gitlab_mcp::ToolContext {
        let state = Arc::new(InstanceState::ready(InstanceInfo {
            version: version.to_string(),
            tier,
        }));
        context(gitlab, Config::default()).with_gate(AvailabilityGate::new(state))
    }

    #[tokio::test]
    async fn test_premium_action_unavailable_on_free_tier() {
        let gitlab = MockGitlab::new().group("g").build();
        let registry = build_registry(&Config::default()).unwrap();

        let err = registry
            .call(
                &gated(&gitlab, "16.4.0", Tier::Free),
                "browse_milestones",
                json!({"action": "burndown", "namespace": "g", "milestone_id": "1"}),
            )
            .await
            .unwrap_err();

        match err {
            GitlabMcpError::Unavailable { tool, action } => {
                assert_eq!(tool, "browse_milestones");
                assert_eq!(action.as_deref(), Some("burndown"));
            }
            other => panic!("expected unavailable, got {:?}", other),
        }
        assert!(gitlab.requests().is_empty());
    }

    #[tokio::test]
    async fn test_other_actions_of_gated_tool_still_run() {
        let gitlab = MockGitlab::new()
            .group("g")
            .on(Method::Get, "groups/g/milestones", 200, "[]")
            .build();
        let registry = build_registry(&Config::default()).unwrap();

        let result = registry
            .call(
                &gated(&gitlab, "16.4.0", Tier::Free),
                "browse_milestones",
                json!({"action": "list", "namespace": "g"}),
            )
            .await
            .unwrap();

        assert_eq!(result, json!([]));
    }
}
