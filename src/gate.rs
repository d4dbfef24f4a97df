//! Tool availability gating by GitLab version and subscription tier.
//!
//! Requirements are looked up from most to least specific:
//! 1. per-(tool, action) override
//! 2. the tool's default in the action table
//! 3. the legacy flat per-tool table
//! 4. unknown tools are allowed only on instances at or above [`UNKNOWN_TOOL_BASELINE`]

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::gitlab::instance::{InstanceError, InstanceInfoSource};

/// Subscription tier, ordered free < premium < ultimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Premium,
    Ultimate,
}

impl Tier {
    pub fn rank(&self) -> u8 {
        match self {
            Tier::Free => 0,
            Tier::Premium => 1,
            Tier::Ultimate => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Premium => "premium",
            Tier::Ultimate => "ultimate",
        }
    }

    /// Maps a license plan name (including legacy plan names) to a tier.
    pub fn from_plan(plan: &str) -> Self {
        match plan.trim().to_lowercase().as_str() {
            "premium" | "silver" => Tier::Premium,
            "ultimate" | "gold" => Tier::Ultimate,
            _ => Tier::Free,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" | "core" => Ok(Tier::Free),
            "premium" => Ok(Tier::Premium),
            "ultimate" => Ok(Tier::Ultimate),
            other => Err(format!(
                "unknown tier '{}' (expected free, premium or ultimate)",
                other
            )),
        }
    }
}

/// Minimum version and tier a tool or action needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Requirement {
    pub min_version: f64,
    pub tier: Tier,
    pub notes: Option<&'static str>,
}

impl Requirement {
    pub const fn new(min_version: f64, tier: Tier) -> Self {
        Self {
            min_version,
            tier,
            notes: None,
        }
    }

    pub const fn with_notes(mut self, notes: &'static str) -> Self {
        self.notes = Some(notes);
        self
    }

    pub fn is_satisfied_by(&self, version: f64, tier: Tier) -> bool {
        // versions are major + minor/100; the epsilon absorbs float rounding at the boundary
        version + 1e-9 >= self.min_version && tier.rank() >= self.tier.rank()
    }
}

/// Default requirement of a tool plus per-action overrides.
#[derive(Debug, Clone, Copy)]
pub struct ToolRequirements {
    pub default: Requirement,
    pub actions: &'static [(&'static str, Requirement)],
}

/// Unknown tools are allowed only on instances at or above this version.
pub const UNKNOWN_TOOL_BASELINE: f64 = 15.0;

static ACTION_REQUIREMENTS: &[(&str, ToolRequirements)] = &[
    (
        "browse_milestones",
        ToolRequirements {
            default: Requirement::new(8.0, Tier::Free),
            actions: &[(
                "burndown",
                Requirement::new(12.01, Tier::Premium)
                    .with_notes("Burndown chart events are a Premium feature"),
            )],
        },
    ),
    (
        "manage_milestone",
        ToolRequirements {
            default: Requirement::new(8.0, Tier::Free),
            actions: &[(
                "promote",
                Requirement::new(11.09, Tier::Free)
                    .with_notes("Promotes a project milestone to its parent group"),
            )],
        },
    ),
    (
        "browse_variables",
        ToolRequirements {
            default: Requirement::new(9.05, Tier::Free)
                .with_notes("Group-level variables arrived in 9.5"),
            actions: &[],
        },
    ),
    (
        "manage_variable",
        ToolRequirements {
            default: Requirement::new(9.05, Tier::Free),
            actions: &[],
        },
    ),
    (
        "browse_merge_requests",
        ToolRequirements {
            default: Requirement::new(8.0, Tier::Free),
            actions: &[("discussions", Requirement::new(11.02, Tier::Free))],
        },
    ),
    (
        "manage_merge_request",
        ToolRequirements {
            default: Requirement::new(8.0, Tier::Free),
            actions: &[("comment", Requirement::new(11.02, Tier::Free))],
        },
    ),
    (
        "manage_time_tracking",
        ToolRequirements {
            default: Requirement::new(8.16, Tier::Free),
            actions: &[],
        },
    ),
];

static LEGACY_REQUIREMENTS: &[(&str, Requirement)] = &[
    ("browse_labels", Requirement::new(8.0, Tier::Free)),
    ("manage_label", Requirement::new(8.0, Tier::Free)),
    ("browse_issues", Requirement::new(8.0, Tier::Free)),
    ("manage_issue", Requirement::new(8.0, Tier::Free)),
    ("browse_time_tracking", Requirement::new(8.16, Tier::Free)),
];

static VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*v?(\d+)(?:\.(\d+))?").expect("valid version regex"));

/// Parses `major.minor[.patch][-suffix]` into `major + minor / 100`.
///
/// Anything unparsable is `0.0`, which fails every non-zero minimum.
pub fn parse_version(version: &str) -> f64 {
    let Some(caps) = VERSION.captures(version) else {
        return 0.0;
    };
    let major = caps
        .get(1)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(0);
    let minor = caps
        .get(2)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(0);
    f64::from(major) + f64::from(minor) / 100.0
}

/// Finds the most specific requirement for a tool and optional action.
pub fn requirement_for(tool: &str, action: Option<&str>) -> Option<Requirement> {
    if let Some((_, reqs)) = ACTION_REQUIREMENTS.iter().find(|(name, _)| *name == tool) {
        if let Some(action) = action {
            if let Some((_, req)) = reqs.actions.iter().find(|(a, _)| *a == action) {
                return Some(*req);
            }
        }
        return Some(reqs.default);
    }

    LEGACY_REQUIREMENTS
        .iter()
        .find(|(name, _)| *name == tool)
        .map(|(_, req)| *req)
}

/// Decides whether a tool (and action) can run against the connected instance.
#[derive(Clone)]
pub struct AvailabilityGate {
    source: Arc<dyn InstanceInfoSource>,
}

impl AvailabilityGate {
    pub fn new(source: Arc<dyn InstanceInfoSource>) -> Self {
        Self { source }
    }

    pub fn is_available(&self, tool: &str, action: Option<&str>) -> bool {
        let info = match self.source.instance_info() {
            Ok(info) => info,
            Err(InstanceError::NotInitialized) => {
                debug!(tool, "instance info not yet available, allowing tool");
                return true;
            }
            Err(InstanceError::Lookup(reason)) => {
                warn!(tool, reason = %reason, "instance info lookup failed, denying tool");
                return false;
            }
        };

        let version = parse_version(&info.version);
        let allowed = match requirement_for(tool, action) {
            Some(req) => req.is_satisfied_by(version, info.tier),
            None => version + 1e-9 >= UNKNOWN_TOOL_BASELINE,
        };
        if !allowed {
            debug!(
                tool,
                action = action.unwrap_or("-"),
                version = %info.version,
                tier = %info.tier,
                "tool gated off"
            );
        }
        allowed
    }
}
