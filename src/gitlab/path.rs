use std::fmt;

use crate::identifier::normalize;
use crate::namespace::ResolvedNamespace;

/// Builder for `{projects|groups}/{id}/{resource}[/{id}[/{sub}[/{subid}]]]` paths.
///
/// Literal segments go through [`ApiPath::push`]; user-supplied identifiers
/// go through [`ApiPath::id`] so they are encoded exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPath {
    segments: Vec<String>,
}

impl ApiPath {
    pub fn namespace(ns: &ResolvedNamespace) -> Self {
        Self {
            segments: vec![
                ns.entity_type.collection().to_string(),
                ns.encoded_path.clone(),
            ],
        }
    }

    pub fn project(id: &str) -> Self {
        Self::root("projects").id(id)
    }

    pub fn group(id: &str) -> Self {
        Self::root("groups").id(id)
    }

    pub fn root(segment: &str) -> Self {
        Self {
            segments: vec![segment.to_string()],
        }
    }

    pub fn push(mut self, segment: &str) -> Self {
        self.segments.push(segment.to_string());
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.segments.push(normalize(id));
        self
    }
}

impl fmt::Display for ApiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl From<ApiPath> for String {
    fn from(path: ApiPath) -> Self {
        path.to_string()
    }
}
