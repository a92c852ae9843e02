//! Tool descriptors: invocable wrappers around capabilities.
//!
//! A tool carries its own metadata, safety/business rules and parameter
//! schema. It is either bound to a method by name (`method_name`) or carries
//! its own implementation closure, or both (the closure wins at call time).

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capabilities::{validate_parameters, MethodDescriptor, ParameterSpec, ValidatedParams};
use crate::error::{HubError, ValidationError};

/// Type alias for an async tool implementation.
pub type ToolImplementation =
    Arc<dyn Fn(ValidatedParams) -> BoxFuture<'static, Result<Value, HubError>> + Send + Sync>;

/// Wrap an async function as a [`ToolImplementation`].
pub fn implementation<F, Fut>(f: F) -> ToolImplementation
where
    F: Fn(ValidatedParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HubError>> + Send + 'static,
{
    Arc::new(move |params: ValidatedParams| f(params).boxed())
}

/// Descriptive metadata of a tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub doc_links: Vec<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Safety and business rules of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolBusinessRules {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub deprecation_message: Option<String>,
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub required_permissions: Vec<String>,
    /// Empty means any role.
    #[serde(default)]
    pub allowed_roles: Vec<String>,
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,
    #[serde(default)]
    pub rate_limit_per_hour: Option<u32>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub requires_casefile: bool,
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> Option<u64> {
    Some(30)
}

impl Default for ToolBusinessRules {
    fn default() -> Self {
        Self {
            enabled: true,
            deprecated: false,
            deprecation_message: None,
            requires_auth: false,
            required_permissions: Vec::new(),
            allowed_roles: Vec::new(),
            rate_limit_per_minute: None,
            rate_limit_per_hour: None,
            timeout_seconds: default_timeout(),
            max_retries: 0,
            requires_casefile: false,
        }
    }
}

/// An invocable tool.
#[derive(Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub metadata: ToolMetadata,
    #[serde(default)]
    pub business_rules: ToolBusinessRules,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    /// Bound method, checked by the consistency pass.
    #[serde(default)]
    pub method_name: Option<String>,
    #[serde(skip)]
    pub implementation: Option<ToolImplementation>,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.metadata.name)
            .field("method_name", &self.method_name)
            .field("enabled", &self.business_rules.enabled)
            .field("parameters", &self.parameters.len())
            .field("has_implementation", &self.implementation.is_some())
            .finish()
    }
}

impl ToolDescriptor {
    pub fn builder(name: impl Into<String>) -> ToolDescriptorBuilder {
        let name = name.into();
        ToolDescriptorBuilder {
            tool: ToolDescriptor {
                metadata: ToolMetadata {
                    display_name: name.clone(),
                    name,
                    version: default_version(),
                    ..Default::default()
                },
                business_rules: ToolBusinessRules::default(),
                parameters: Vec::new(),
                method_name: None,
                implementation: None,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Validate raw input against the tool's parameter schema.
    pub fn validate(&self, raw: &Value) -> Result<ValidatedParams, ValidationError> {
        validate_parameters(&self.parameters, raw)
    }

    pub fn is_bound(&self) -> bool {
        self.method_name.as_deref().map_or(false, |m| !m.is_empty())
    }
}

/// Builder for [`ToolDescriptor`].
pub struct ToolDescriptorBuilder {
    tool: ToolDescriptor,
}

impl ToolDescriptorBuilder {
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.tool.metadata.display_name = display_name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.tool.metadata.description = description.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.tool.metadata.category = category.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.tool.metadata.version = version.into();
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tool.metadata.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn doc_link(mut self, link: impl Into<String>) -> Self {
        self.tool.metadata.doc_links.push(link.into());
        self
    }

    pub fn rules(mut self, rules: ToolBusinessRules) -> Self {
        self.tool.business_rules = rules;
        self
    }

    pub fn parameters(mut self, parameters: Vec<ParameterSpec>) -> Self {
        self.tool.parameters = parameters;
        self
    }

    /// Bind to a method by name only (no parameter copy).
    pub fn method_name(mut self, method: impl Into<String>) -> Self {
        self.tool.method_name = Some(method.into());
        self
    }

    /// Bind to a method, adopting its parameters when none were set.
    pub fn bind(mut self, method: &MethodDescriptor) -> Self {
        self.tool.method_name = Some(method.name.clone());
        if self.tool.parameters.is_empty() {
            self.tool.parameters = method.parameters.clone();
        }
        self
    }

    pub fn implementation(mut self, implementation: ToolImplementation) -> Self {
        self.tool.implementation = Some(implementation);
        self
    }

    pub fn build(self) -> ToolDescriptor {
        self.tool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{CapabilityVerb, Classification, Domain, ParameterType, Subdomain};
    use serde_json::json;

    fn method() -> MethodDescriptor {
        let mut m = MethodDescriptor::builder(
            "casefile.create",
            Classification::atomic(Domain::Workspace, Subdomain::Casefile, CapabilityVerb::Create),
        )
        .build();
        m.parameters = vec![ParameterSpec::new("title", ParameterType::String).required()];
        m
    }

    #[test]
    fn test_bind_adopts_method_parameters() {
        let tool = ToolDescriptor::builder("create_casefile_tool").bind(&method()).build();
        assert_eq!(tool.method_name.as_deref(), Some("casefile.create"));
        assert_eq!(tool.parameters.len(), 1);
        assert!(tool.is_bound());
        assert_eq!(tool.metadata.display_name, "create_casefile_tool");
    }

    #[test]
    fn test_validate_required_field() {
        let tool = ToolDescriptor::builder("create_casefile_tool").bind(&method()).build();
        assert!(tool.validate(&json!({"title": "Incident"})).is_ok());
        let err = tool.validate(&json!({})).unwrap_err();
        assert!(err.has_field("title"));
    }

    #[tokio::test]
    async fn test_implementation_wrapper() {
        let imp = implementation(|params: ValidatedParams| async move {
            Ok(json!({"echo": params.get("title").cloned()}))
        });
        let tool = ToolDescriptor::builder("echo")
            .parameters(vec![ParameterSpec::new("title", ParameterType::String)])
            .implementation(imp)
            .build();
        let params = tool.validate(&json!({"title": "x"})).unwrap();
        let out = (tool.implementation.as_ref().unwrap())(params).await.unwrap();
        assert_eq!(out, json!({"echo": "x"}));
        assert!(!tool.is_bound());
    }

    #[test]
    fn test_rules_defaults_from_yaml() {
        let rules: ToolBusinessRules = serde_yaml::from_str("requires_auth: true").unwrap();
        assert!(rules.enabled);
        assert!(rules.requires_auth);
        assert_eq!(rules.timeout_seconds, Some(30));
    }
}
