pub mod batch;
pub mod config;
pub mod duration;
pub mod entities;
pub mod error;
pub mod gate;
pub mod gitlab;
pub mod identifier;
pub mod namespace;
pub mod params;
pub mod session;
pub mod tools;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use batch::{process_batch, BatchItemResult, BatchReport, BatchSummary};
pub use config::{Config, SchemaMode};
pub use duration::{format_duration, parse_duration};
pub use error::{FieldIssue, GitlabMcpError, Result};
pub use gate::{AvailabilityGate, Requirement, Tier};
pub use gitlab::{
    detect_instance, ApiPath, HttpRequest, HttpResponse, InstanceInfo, InstanceInfoSource,
    InstanceState, Method, Payload, RestClient, Transport,
};
pub use namespace::{resolve_namespace, EntityType, ResolvedNamespace};
pub use session::{Credentials, Session};
pub use tools::{build_registry, ToolContext, ToolDefinition, ToolRegistry};
