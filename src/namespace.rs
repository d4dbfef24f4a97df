//! Group-or-project namespace resolution.
//!
//! A namespace path is checked against the API to decide whether it names a
//! project or a group. Resolution never fails: when both lookups miss, the
//! slash heuristic decides and an invalid namespace surfaces later as a
//! normal 404 from the real operation. Results are not cached.

use serde::Serialize;
use tracing::debug;

use crate::gitlab::{HttpRequest, Transport};
use crate::identifier::{decoded, normalize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Projects,
    Groups,
}

impl EntityType {
    /// API collection name.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityType::Projects => "projects",
            EntityType::Groups => "groups",
        }
    }

    pub fn other(&self) -> Self {
        match self {
            EntityType::Projects => EntityType::Groups,
            EntityType::Groups => EntityType::Projects,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedNamespace {
    pub entity_type: EntityType,
    pub encoded_path: String,
}

/// Projects are addressed as `group/project`, so a slash suggests a project.
pub fn likely_kind(namespace: &str) -> EntityType {
    if decoded(namespace).contains('/') {
        EntityType::Projects
    } else {
        EntityType::Groups
    }
}

pub async fn resolve_namespace(transport: &dyn Transport, namespace: &str) -> ResolvedNamespace {
    let encoded_path = normalize(namespace);
    let likely = likely_kind(namespace);

    let entity_type = if exists(transport, likely, &encoded_path).await {
        likely
    } else if exists(transport, likely.other(), &encoded_path).await {
        likely.other()
    } else {
        debug!(namespace, kind = likely.collection(), "namespace not found, using heuristic");
        likely
    };

    ResolvedNamespace {
        entity_type,
        encoded_path,
    }
}

/// Existence check; transport and API errors count as "does not exist".
async fn exists(transport: &dyn Transport, kind: EntityType, encoded_path: &str) -> bool {
    let mut request = HttpRequest::get(format!("{}/{}", kind.collection(), encoded_path));
    if kind == EntityType::Groups {
        request = request.with_param("with_projects", "false");
    }
    match transport.send(request).await {
        Ok(response) => {
            debug!(
                kind = kind.collection(),
                path = encoded_path,
                status = response.status,
                "namespace lookup"
            );
            response.is_success()
        }
        Err(e) => {
            debug!(kind = kind.collection(), path = encoded_path, error = %e, "namespace lookup failed");
            false
        }
    }
}
