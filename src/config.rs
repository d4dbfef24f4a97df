//! Environment-driven configuration.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{GitlabMcpError, Result};
use crate::gate::Tier;

pub const DEFAULT_API_URL: &str = "https://gitlab.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BATCH_CONCURRENCY: usize = 4;

/// Entity feature flags; each defaults to enabled.
pub const FEATURE_FLAGS: &[&str] = &[
    "USE_MILESTONE",
    "USE_VARIABLES",
    "USE_LABELS",
    "USE_MRS",
    "USE_WORKITEMS",
    "USE_TIME_TRACKING",
];

/// How tool input schemas are rendered for clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaMode {
    /// `oneOf` with one object per action.
    #[default]
    Discriminated,
    /// One object with the union of all action fields, for clients without union support.
    Flat,
}

impl FromStr for SchemaMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "discriminated" | "oneof" => Ok(SchemaMode::Discriminated),
            "flat" => Ok(SchemaMode::Flat),
            other => Err(format!("unknown schema mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub token: Option<String>,
    pub cookie_path: Option<PathBuf>,
    pub read_only: bool,
    pub schema_mode: SchemaMode,
    pub tier_override: Option<Tier>,
    pub http_timeout: Duration,
    pub batch_concurrency: usize,
    denied_actions: BTreeSet<(String, String)>,
    features: HashMap<String, bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            cookie_path: None,
            read_only: false,
            schema_mode: SchemaMode::default(),
            tier_override: None,
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            denied_actions: BTreeSet::new(),
            features: HashMap::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Config::default();

        if let Some(url) = get("GITLAB_API_URL") {
            config.api_url = url;
        }
        config.token = get("GITLAB_PERSONAL_ACCESS_TOKEN").or_else(|| get("GITLAB_TOKEN"));
        config.cookie_path = get("GITLAB_AUTH_COOKIE_PATH").map(PathBuf::from);

        if let Some(value) = get("GITLAB_READ_ONLY_MODE") {
            config.read_only = parse_bool("GITLAB_READ_ONLY_MODE", &value)?;
        }
        if let Some(value) = get("GITLAB_SCHEMA_MODE") {
            config.schema_mode = value
                .parse()
                .map_err(|e| GitlabMcpError::Config(format!("GITLAB_SCHEMA_MODE: {}", e)))?;
        }
        if let Some(value) = get("GITLAB_TIER") {
            let tier = value
                .parse()
                .map_err(|e| GitlabMcpError::Config(format!("GITLAB_TIER: {}", e)))?;
            config.tier_override = Some(tier);
        }
        if let Some(value) = get("GITLAB_HTTP_TIMEOUT_SECS") {
            let secs = parse_number::<u64>("GITLAB_HTTP_TIMEOUT_SECS", &value)?;
            config.http_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(value) = get("GITLAB_BATCH_CONCURRENCY") {
            config.batch_concurrency =
                parse_number::<usize>("GITLAB_BATCH_CONCURRENCY", &value)?.max(1);
        }
        if let Some(value) = get("GITLAB_DENIED_ACTIONS") {
            config.denied_actions = parse_denied_actions(&value)?;
        }

        for &flag in FEATURE_FLAGS {
            if let Some(value) = get(flag) {
                config.features.insert(flag.to_string(), parse_bool(flag, &value)?);
            }
        }

        Ok(config)
    }

    /// API host root without a trailing slash or `/api/v4` suffix.
    pub fn api_root(&self) -> String {
        let trimmed = self.api_url.trim().trim_end_matches('/');
        trimmed
            .strip_suffix("/api/v4")
            .unwrap_or(trimmed)
            .to_string()
    }

    /// Explicit value of a feature flag, if one was set.
    pub fn feature(&self, flag: &str) -> Option<bool> {
        self.features.get(flag).copied()
    }

    pub fn set_feature(&mut self, flag: &str, enabled: bool) {
        self.features.insert(flag.to_string(), enabled);
    }

    pub fn is_denied(&self, tool: &str, action: &str) -> bool {
        self.denied_actions
            .contains(&(tool.to_string(), action.to_string()))
    }

    pub fn deny_action(&mut self, tool: &str, action: &str) {
        self.denied_actions
            .insert((tool.to_string(), action.to_string()));
    }
}

pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(GitlabMcpError::Config(format!(
            "{}: expected a boolean, got '{}'",
            key, other
        ))),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        GitlabMcpError::Config(format!("{}: expected a number, got '{}'", key, value))
    })
}

/// Parses `tool:action,tool:action`.
fn parse_denied_actions(value: &str) -> Result<BTreeSet<(String, String)>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((tool, action)) if !tool.trim().is_empty() && !action.trim().is_empty() => {
                Ok((tool.trim().to_string(), action.trim().to_string()))
            }
            _ => Err(GitlabMcpError::Config(format!(
                "GITLAB_DENIED_ACTIONS: expected 'tool:action', got '{}'",
                entry
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.api_root(), "https://gitlab.com");
        assert!(!config.read_only);
        assert_eq!(config.feature("USE_MILESTONE"), None);
        assert_eq!(config.schema_mode, SchemaMode::Discriminated);
        assert_eq!(config.batch_concurrency, 4);
    }

    #[test]
    fn test_api_root_strips_suffix() {
        let config = load(&[("GITLAB_API_URL", "https://git.example.com/api/v4/")]).unwrap();
        assert_eq!(config.api_root(), "https://git.example.com");
    }

    #[test]
    fn test_token_precedence() {
        let config = load(&[
            ("GITLAB_TOKEN", "fallback"),
            ("GITLAB_PERSONAL_ACCESS_TOKEN", "primary"),
        ])
        .unwrap();
        assert_eq!(config.token.as_deref(), Some("primary"));
    }

    #[test]
    fn test_flags() {
        let config = load(&[
            ("GITLAB_READ_ONLY_MODE", "TRUE"),
            ("USE_VARIABLES", "false"),
            ("USE_LABELS", "1"),
            ("GITLAB_SCHEMA_MODE", "flat"),
            ("GITLAB_TIER", "ultimate"),
        ])
        .unwrap();
        assert!(config.read_only);
        assert_eq!(config.feature("USE_VARIABLES"), Some(false));
        assert_eq!(config.feature("USE_LABELS"), Some(true));
        assert_eq!(config.schema_mode, SchemaMode::Flat);
        assert_eq!(config.tier_override, Some(Tier::Ultimate));
    }

    #[test]
    fn test_invalid_boolean_names_key() {
        let err = load(&[("USE_MRS", "maybe")]).unwrap_err();
        assert!(err.to_string().contains("USE_MRS"));
    }

    #[test]
    fn test_denied_actions() {
        let config = load(&[(
            "GITLAB_DENIED_ACTIONS",
            "manage_variable:delete, manage_milestone:promote",
        )])
        .unwrap();
        assert!(config.is_denied("manage_variable", "delete"));
        assert!(config.is_denied("manage_milestone", "promote"));
        assert!(!config.is_denied("manage_variable", "create"));

        assert!(load(&[("GITLAB_DENIED_ACTIONS", "manage_variable")]).is_err());
    }
}
