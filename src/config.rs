//! Hub configuration.
//!
//! Every field has a default, so an empty YAML document is a valid config.
//! `HUB_CONFIG` names an optional YAML file. Environment variables override
//! file values:
//!
//! - `HUB_DEFAULT_POLICY`: policy used when neither the request nor the operation picks one
//! - `HUB_STRICT_DRIFT`: `true` makes declarative drift fatal at startup
//! - `HUB_STRICT_CONSISTENCY`: `true` makes dangling tool bindings fatal at startup
//! - `HUB_OPERATION_TIMEOUT_SECS`: deadline for the core operation of each dispatch
//! - `HUB_CAPABILITIES_FILE`: declarative capability list checked for drift

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HubError;
use crate::policy::DEFAULT_POLICY;

/// Path of an optional YAML config file.
pub const CONFIG_FILE_VAR: &str = "HUB_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub default_policy: String,
    pub strict_drift: bool,
    pub strict_consistency: bool,
    pub operation_timeout_secs: Option<u64>,
    /// Log unknown hook names and list them under `skipped_hooks`.
    pub warn_on_unknown_hooks: bool,
    pub capabilities_file: Option<PathBuf>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            default_policy: DEFAULT_POLICY.to_string(),
            strict_drift: false,
            strict_consistency: false,
            operation_timeout_secs: None,
            warn_on_unknown_hooks: true,
            capabilities_file: None,
        }
    }
}

impl HubConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, HubError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, HubError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Config from the process environment: the `HUB_CONFIG` file when set,
    /// else defaults, then the `HUB_*` overrides.
    pub fn from_env() -> Result<Self, HubError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// [`HubConfig::from_env`] over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, HubError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = match lookup(CONFIG_FILE_VAR).filter(|v| !v.trim().is_empty()) {
            Some(path) => Self::from_yaml_file(path.trim())
                .map_err(|e| HubError::Config(format!("{} '{}': {}", CONFIG_FILE_VAR, path, e)))?,
            None => Self::default(),
        };
        base.with_overrides(lookup)
    }

    /// Apply overrides from `lookup` (an environment-like key lookup).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, HubError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(policy) = lookup("HUB_DEFAULT_POLICY").filter(|v| !v.trim().is_empty()) {
            self.default_policy = policy.trim().to_string();
        }
        if let Some(value) = lookup("HUB_STRICT_DRIFT") {
            self.strict_drift = parse_bool("HUB_STRICT_DRIFT", &value)?;
        }
        if let Some(value) = lookup("HUB_STRICT_CONSISTENCY") {
            self.strict_consistency = parse_bool("HUB_STRICT_CONSISTENCY", &value)?;
        }
        if let Some(value) = lookup("HUB_OPERATION_TIMEOUT_SECS") {
            let secs = value.trim().parse::<u64>().map_err(|_| {
                HubError::Config(format!("HUB_OPERATION_TIMEOUT_SECS must be an integer, got '{}'", value))
            })?;
            self.operation_timeout_secs = Some(secs);
        }
        if let Some(path) = lookup("HUB_CAPABILITIES_FILE").filter(|v| !v.trim().is_empty()) {
            self.capabilities_file = Some(PathBuf::from(path));
        }
        Ok(self)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, HubError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(HubError::Config(format!("{} must be a boolean, got '{}'", key, other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = HubConfig::default();
        assert_eq!(config.default_policy, "default");
        assert!(config.warn_on_unknown_hooks);
        assert!(config.operation_timeout().is_none());
        assert_eq!(HubConfig::from_yaml("").unwrap(), config);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = HubConfig::from_yaml("strict_drift: true\noperation_timeout_secs: 5\n").unwrap();
        assert!(config.strict_drift);
        assert_eq!(config.operation_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.default_policy, "default");
        assert!(config.warn_on_unknown_hooks);
    }

    #[test]
    fn test_overrides() {
        let config = HubConfig::default()
            .with_overrides(lookup(&[
                ("HUB_DEFAULT_POLICY", "session_observer"),
                ("HUB_STRICT_CONSISTENCY", "yes"),
                ("HUB_OPERATION_TIMEOUT_SECS", "10"),
                ("HUB_CAPABILITIES_FILE", "/etc/hub/capabilities.yaml"),
            ]))
            .unwrap();
        assert_eq!(config.default_policy, "session_observer");
        assert!(config.strict_consistency);
        assert!(!config.strict_drift);
        assert_eq!(config.operation_timeout_secs, Some(10));
        assert_eq!(config.capabilities_file, Some(PathBuf::from("/etc/hub/capabilities.yaml")));
    }

    #[test]
    fn test_lookup_reads_file_then_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.yaml");
        std::fs::write(&path, "strict_drift: true\noperation_timeout_secs: 5\n").unwrap();
        let path = path.to_string_lossy().into_owned();

        let config = HubConfig::from_lookup(lookup(&[
            (CONFIG_FILE_VAR, path.as_str()),
            ("HUB_OPERATION_TIMEOUT_SECS", "9"),
        ]))
        .unwrap();
        assert!(config.strict_drift);
        assert_eq!(config.operation_timeout_secs, Some(9));

        assert_eq!(HubConfig::from_lookup(lookup(&[])).unwrap(), HubConfig::default());

        let err = HubConfig::from_lookup(lookup(&[(CONFIG_FILE_VAR, "/nonexistent/hub.yaml")])).unwrap_err();
        assert!(matches!(err, HubError::Config(ref m) if m.contains("/nonexistent/hub.yaml")));
    }

    #[test]
    fn test_bad_override_values() {
        let err = HubConfig::default()
            .with_overrides(lookup(&[("HUB_STRICT_DRIFT", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("HUB_STRICT_DRIFT"));

        let err = HubConfig::default()
            .with_overrides(lookup(&[("HUB_OPERATION_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, HubError::Config(_)));
    }
}
