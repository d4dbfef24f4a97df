//! GitLab entity groups, each exposing a browse tool and a manage tool.

pub mod issues;
pub mod labels;
pub mod merge_requests;
pub mod milestones;
pub mod time_tracking;
pub mod variables;

use serde_json::{json, Value};

use crate::config::SchemaMode;
use crate::error::Result;
use crate::gitlab::{ApiPath, HttpRequest, Payload};
use crate::tools::ToolDefinition;

/// Every tool of every entity group, in presentation order.
pub fn all_tools(mode: SchemaMode) -> Result<Vec<ToolDefinition>> {
    let mut tools = Vec::new();
    tools.extend(milestones::tools(mode)?);
    tools.extend(variables::tools(mode)?);
    tools.extend(labels::tools(mode)?);
    tools.extend(merge_requests::tools(mode)?);
    tools.extend(issues::tools(mode)?);
    tools.extend(time_tracking::tools(mode)?);
    Ok(tools)
}

/// Standard CRUD routes of one collection beneath a parent resource.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Collection {
    name: &'static str,
}

impl Collection {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub(crate) fn path(&self, parent: ApiPath) -> ApiPath {
        parent.push(self.name)
    }

    pub(crate) fn item(&self, parent: ApiPath, id: &str) -> ApiPath {
        parent.push(self.name).id(id)
    }

    pub(crate) fn list(&self, parent: ApiPath, query: Vec<(String, String)>) -> HttpRequest {
        HttpRequest::get(self.path(parent)).with_query(query)
    }

    pub(crate) fn get(&self, parent: ApiPath, id: &str) -> HttpRequest {
        HttpRequest::get(self.item(parent, id))
    }

    pub(crate) fn create(&self, parent: ApiPath, body: Payload) -> HttpRequest {
        HttpRequest::post(self.path(parent)).with_body(body)
    }

    pub(crate) fn update(&self, parent: ApiPath, id: &str, body: Payload) -> HttpRequest {
        HttpRequest::put(self.item(parent, id)).with_body(body)
    }

    pub(crate) fn delete(&self, parent: ApiPath, id: &str) -> HttpRequest {
        HttpRequest::delete(self.item(parent, id))
    }
}

/// Result reported for successful deletions, whose upstream body is empty.
pub(crate) fn deleted() -> Value {
    json!({ "deleted": true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitlab::Method;

    #[test]
    fn test_collection_routes() {
        const MILESTONES: Collection = Collection::new("milestones");
        let parent = || ApiPath::project("g/p");

        let list = MILESTONES.list(parent(), vec![("state".into(), "active".into())]);
        assert_eq!(list.path, "projects/g%2Fp/milestones");
        assert_eq!(list.query_value("state"), Some("active"));

        let update = MILESTONES.update(parent(), "7", Payload::Empty);
        assert_eq!(update.method, Method::Put);
        assert_eq!(update.path, "projects/g%2Fp/milestones/7");

        assert_eq!(MILESTONES.delete(parent(), "7").method, Method::Delete);
    }

    #[test]
    fn test_tool_names_are_unique() {
        let tools = all_tools(SchemaMode::default()).unwrap();
        let mut names: Vec<_> = tools.iter().map(|t| t.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), tools.len());
    }
}
