//! # Policy patterns
//!
//! Named bundles of default context requirements and hooks. A request
//! selects a pattern through `policy_hints.pattern`, otherwise the
//! operation's default pattern applies, otherwise the configured default.
//!
//! ```yaml
//! patterns:
//!   - name: casefile_scoped
//!     description: Operations that read their casefile
//!     defaults:
//!       context_requirements: ["casefile"]
//!       hooks: ["metrics", "audit"]
//! ```
//!
//! Patterns are fixed when the loader is constructed. `load` hands out
//! copies so callers cannot alter shared defaults.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HubError, RegistryKind};

pub const DEFAULT_POLICY: &str = "default";
pub const SESSION_OBSERVER_POLICY: &str = "session_observer";

/// Defaults contributed by a pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDefaults {
    #[serde(default)]
    pub context_requirements: Vec<String>,
    #[serde(default)]
    pub hooks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPattern {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub defaults: PolicyDefaults,
}

impl PolicyPattern {
    pub fn new(name: &str, description: &str, context: &[&str], hooks: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            defaults: PolicyDefaults {
                context_requirements: context.iter().map(|s| s.to_string()).collect(),
                hooks: hooks.iter().map(|s| s.to_string()).collect(),
            },
        }
    }
}

/// The two patterns every loader starts with.
pub fn builtin_patterns() -> Vec<PolicyPattern> {
    vec![
        PolicyPattern::new(
            DEFAULT_POLICY,
            "No context unless requested; metrics and audit hooks",
            &[],
            &["metrics", "audit"],
        ),
        PolicyPattern::new(
            SESSION_OBSERVER_POLICY,
            "Fetches the request session; metrics and audit hooks",
            &["session"],
            &["metrics", "audit"],
        ),
    ]
}

/// Wrapper for YAML deserialization (patterns are nested under `patterns:`).
#[derive(Debug, Deserialize)]
struct PatternListWrapper {
    patterns: Vec<PolicyPattern>,
}

/// Static pattern lookup.
#[derive(Debug, Clone)]
pub struct PolicyLoader {
    patterns: HashMap<String, PolicyPattern>,
}

impl Default for PolicyLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyLoader {
    /// Loader with the built-in patterns only.
    pub fn new() -> Self {
        let patterns = builtin_patterns()
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        Self { patterns }
    }

    /// Built-in patterns plus `extra`. Reusing any existing name, built-in
    /// ones included, is a conflict.
    pub fn with_patterns(extra: impl IntoIterator<Item = PolicyPattern>) -> Result<Self, HubError> {
        let mut loader = Self::new();
        for pattern in extra {
            if loader.patterns.contains_key(&pattern.name) {
                return Err(HubError::RegistrationConflict {
                    kind: RegistryKind::Policy,
                    name: pattern.name,
                });
            }
            loader.patterns.insert(pattern.name.clone(), pattern);
        }
        Ok(loader)
    }

    /// Built-in patterns plus a `patterns:` list from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, HubError> {
        let wrapper: PatternListWrapper = serde_yaml::from_str(yaml)?;
        Self::with_patterns(wrapper.patterns)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, HubError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Name of the pattern `name` resolves to (`default` when unknown).
    pub fn resolve<'a>(&self, name: &'a str) -> &'a str {
        if self.patterns.contains_key(name) {
            name
        } else {
            log::debug!("Unknown policy pattern '{}', using '{}'", name, DEFAULT_POLICY);
            DEFAULT_POLICY
        }
    }

    /// Copy of the defaults of `name`, falling back to `default`.
    pub fn load(&self, name: &str) -> PolicyDefaults {
        self.patterns
            .get(self.resolve(name))
            .map(|p| p.defaults.clone())
            .unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&PolicyPattern> {
        self.patterns.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.patterns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_patterns() {
        let loader = PolicyLoader::new();
        assert_eq!(loader.names(), vec!["default", "session_observer"]);

        let default = loader.load(DEFAULT_POLICY);
        assert!(default.context_requirements.is_empty());
        assert_eq!(default.hooks, vec!["metrics", "audit"]);

        let observer = loader.load(SESSION_OBSERVER_POLICY);
        assert_eq!(observer.context_requirements, vec!["session"]);
    }

    #[test]
    fn test_unknown_falls_back_to_default() {
        let loader = PolicyLoader::new();
        assert_eq!(loader.resolve("nope"), DEFAULT_POLICY);
        assert_eq!(loader.load("nope"), loader.load(DEFAULT_POLICY));
    }

    #[test]
    fn test_load_returns_copy() {
        let loader = PolicyLoader::new();
        let mut defaults = loader.load(DEFAULT_POLICY);
        defaults.hooks.push("mutated".into());
        assert_eq!(loader.load(DEFAULT_POLICY).hooks, vec!["metrics", "audit"]);
    }

    #[test]
    fn test_from_yaml_adds_patterns() {
        let yaml = r#"
patterns:
  - name: casefile_scoped
    defaults:
      context_requirements: ["casefile"]
      hooks: ["metrics"]
"#;
        let loader = PolicyLoader::from_yaml(yaml).unwrap();
        assert!(loader.contains("casefile_scoped"));
        assert_eq!(loader.load("casefile_scoped").context_requirements, vec!["casefile"]);
        assert_eq!(loader.get("casefile_scoped").unwrap().description, "");
    }

    #[test]
    fn test_redefining_builtin_is_conflict() {
        let err = PolicyLoader::with_patterns([PolicyPattern::new(DEFAULT_POLICY, "", &[], &[])]).unwrap_err();
        assert!(matches!(err, HubError::RegistrationConflict { kind: RegistryKind::Policy, .. }));
    }
}
