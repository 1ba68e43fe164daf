use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::roster::default_roster;
use crate::types::AgentProfile;
use crate::view::SortKey;

/// Environment variables that override the endpoint URLs.
pub const ENV_AGENTS_URL: &str = "PULSEBOARD_AGENTS_URL";
pub const ENV_IDEAS_URL: &str = "PULSEBOARD_IDEAS_URL";
pub const ENV_COS_PM_URL: &str = "PULSEBOARD_COS_PM_URL";

/// Top-level configuration loaded from `~/.pulseboard/config.toml`.
///
/// Every section is optional; a missing file means all defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub view: ViewConfig,
    /// Agents shown on the dashboard, in display order.
    #[serde(default = "default_roster")]
    pub roster: Vec<AgentProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            endpoints: EndpointsConfig::default(),
            refresh: RefreshConfig::default(),
            view: ViewConfig::default(),
            roster: default_roster(),
        }
    }
}

impl Config {
    /// Load config from `~/.pulseboard/config.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings that are not fully expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoints.validate()?;
        self.refresh.validate()?;
        validate_roster(&self.roster)?;
        Ok(())
    }

    /// Replace endpoint URLs from `PULSEBOARD_*_URL` variables that are set
    /// and non-empty.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Same as [`Config::apply_env_overrides`] with an explicit lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let targets = [
            (ENV_AGENTS_URL, &mut self.endpoints.agents_url),
            (ENV_IDEAS_URL, &mut self.endpoints.ideas_url),
            (ENV_COS_PM_URL, &mut self.endpoints.cos_pm_url),
        ];
        for (key, slot) in targets {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = value.trim().to_string();
            }
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pulseboard")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default tracing filter; `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_log_level() -> String {
    "warn".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_agents_url")]
    pub agents_url: String,
    #[serde(default = "default_ideas_url")]
    pub ideas_url: String,
    #[serde(default = "default_cos_pm_url")]
    pub cos_pm_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            agents_url: default_agents_url(),
            ideas_url: default_ideas_url(),
            cos_pm_url: default_cos_pm_url(),
        }
    }
}

impl EndpointsConfig {
    /// All three endpoints under one base URL, at their default paths.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            agents_url: format!("{base}/api/agents/status"),
            ideas_url: format!("{base}/api/ideas"),
            cos_pm_url: format!("{base}/status"),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, url) in [
            ("agents_url", &self.agents_url),
            ("ideas_url", &self.ideas_url),
            ("cos_pm_url", &self.cos_pm_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Validation(format!(
                    "endpoints.{name} must be an http(s) URL, got '{url}'"
                )));
            }
        }
        Ok(())
    }
}

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

fn default_agents_url() -> String {
    format!("{DEFAULT_BASE_URL}/api/agents/status")
}
fn default_ideas_url() -> String {
    format!("{DEFAULT_BASE_URL}/api/ideas")
}
fn default_cos_pm_url() -> String {
    format!("{DEFAULT_BASE_URL}/status")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_feed_secs")]
    pub agents_secs: u64,
    #[serde(default = "default_feed_secs")]
    pub ideas_secs: u64,
    #[serde(default = "default_cos_pm_secs")]
    pub cos_pm_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            agents_secs: default_feed_secs(),
            ideas_secs: default_feed_secs(),
            cos_pm_secs: default_cos_pm_secs(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl RefreshConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, secs) in [
            ("agents_secs", self.agents_secs),
            ("ideas_secs", self.ideas_secs),
            ("cos_pm_secs", self.cos_pm_secs),
            ("request_timeout_secs", self.request_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Validation(format!(
                    "refresh.{name} must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

fn default_feed_secs() -> u64 {
    30
}
fn default_cos_pm_secs() -> u64 {
    300
}
fn default_request_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub default_sort: SortKey,
}

fn validate_roster(roster: &[AgentProfile]) -> Result<(), ConfigError> {
    let mut ids = std::collections::BTreeSet::new();
    for agent in roster {
        let id = agent.id.trim();
        if id.is_empty() {
            return Err(ConfigError::Validation(
                "roster entries must have non-empty id".to_string(),
            ));
        }
        if !ids.insert(id.to_string()) {
            return Err(ConfigError::Validation(format!(
                "roster contains duplicate agent '{id}'"
            )));
        }
        if agent.expected_fast_track_rate > 100 {
            return Err(ConfigError::Validation(format!(
                "roster agent '{id}' expected_fast_track_rate must be 0-100"
            )));
        }
    }
    Ok(())
}
