//! Connected instance detection: version and subscription tier.

use std::sync::RwLock;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{HttpRequest, Transport};
use crate::error::Result;
use crate::gate::Tier;

const LICENSE_QUERY: &str = "query { currentLicense { plan } }";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceInfo {
    pub version: String,
    pub tier: Tier,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InstanceError {
    /// The session has not finished connecting (e.g. deferred credential exchange).
    #[error("instance information is not initialized yet")]
    NotInitialized,

    #[error("instance lookup failed: {0}")]
    Lookup(String),
}

/// Read-only view of the connected instance used by the availability gate.
pub trait InstanceInfoSource: Send + Sync {
    fn instance_info(&self) -> std::result::Result<InstanceInfo, InstanceError>;
}

#[derive(Debug, Clone)]
enum InstanceStatus {
    Pending,
    Ready(InstanceInfo),
    Failed(String),
}

/// Connection-scoped instance state, filled in once detection completes.
#[derive(Debug)]
pub struct InstanceState {
    status: RwLock<InstanceStatus>,
}

impl InstanceState {
    pub fn pending() -> Self {
        Self {
            status: RwLock::new(InstanceStatus::Pending),
        }
    }

    pub fn ready(info: InstanceInfo) -> Self {
        Self {
            status: RwLock::new(InstanceStatus::Ready(info)),
        }
    }

    pub fn mark_ready(&self, info: InstanceInfo) {
        self.set(InstanceStatus::Ready(info));
    }

    pub fn mark_failed(&self, reason: impl Into<String>) {
        self.set(InstanceStatus::Failed(reason.into()));
    }

    /// Runs detection against `transport` and records the outcome.
    pub async fn detect(&self, transport: &dyn Transport, tier_override: Option<Tier>) {
        match detect_instance(transport, tier_override).await {
            Ok(info) => self.mark_ready(info),
            Err(e) => {
                warn!(error = %e, "GitLab instance detection failed");
                self.mark_failed(e.to_string());
            }
        }
    }

    fn set(&self, status: InstanceStatus) {
        match self.status.write() {
            Ok(mut guard) => *guard = status,
            Err(poisoned) => *poisoned.into_inner() = status,
        }
    }
}

impl InstanceInfoSource for InstanceState {
    fn instance_info(&self) -> std::result::Result<InstanceInfo, InstanceError> {
        let guard = self
            .status
            .read()
            .map_err(|_| InstanceError::Lookup("instance state lock poisoned".to_string()))?;
        match &*guard {
            InstanceStatus::Pending => Err(InstanceError::NotInitialized),
            InstanceStatus::Ready(info) => Ok(info.clone()),
            InstanceStatus::Failed(reason) => Err(InstanceError::Lookup(reason.clone())),
        }
    }
}

/// Detects version via `GET version` and tier via override, GraphQL license, or `free`.
pub async fn detect_instance(
    transport: &dyn Transport,
    tier_override: Option<Tier>,
) -> Result<InstanceInfo> {
    let response = transport
        .send(HttpRequest::get("version"))
        .await?
        .error_for_status()?;
    let body = response.json()?;
    let version = body
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let tier = match tier_override {
        Some(tier) => tier,
        None => detect_tier(transport).await,
    };

    info!(version = %version, tier = %tier, "detected GitLab instance");
    Ok(InstanceInfo { version, tier })
}

async fn detect_tier(transport: &dyn Transport) -> Tier {
    match transport.graphql(LICENSE_QUERY, json!({})).await {
        Ok(data) => data
            .pointer("/currentLicense/plan")
            .and_then(Value::as_str)
            .map(Tier::from_plan)
            .unwrap_or(Tier::Free),
        Err(e) => {
            debug!(error = %e, "license query failed, assuming free tier");
            Tier::Free
        }
    }
}
