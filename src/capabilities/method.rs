//! Method descriptors: the registered unit of business functionality.
//!
//! A method is classified along six closed axes, owned by a service (kept as
//! opaque strings, never live references), carries business rules, and
//! names the typed request/response models it consumes and produces.
//!
//! Methods come from two places:
//! 1. Explicit builder calls at startup ([`MethodDescriptor::builder`])
//! 2. Declarative [`CapabilityRecord`] lists, resolved against a
//!    [`ModelCatalog`] for their parameter specs

use std::collections::HashMap;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::classification::{Classification, ClassificationIssue};
use super::parameter::{parameters_of, ParameterSpec};
use crate::error::{HubError, RegistryKind};

/// Where a method is implemented. Opaque strings to avoid import cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    /// Implementing service name (e.g. `CasefileService`).
    pub service: String,
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub function: String,
}

impl OwnerRef {
    pub fn new(service: impl Into<String>, module: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            module: module.into(),
            function: function.into(),
        }
    }
}

/// Deprecation notice for a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deprecation {
    pub since: String,
    #[serde(default)]
    pub removal: Option<String>,
    #[serde(default)]
    pub replacement: Option<String>,
}

/// Business rules attached to a method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodBusinessRules {
    #[serde(default)]
    pub required_permissions: Vec<String>,
    #[serde(default)]
    pub idempotent: bool,
    #[serde(default)]
    pub transactional: bool,
    #[serde(default)]
    pub deprecation: Option<Deprecation>,
}

/// A registered capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// Globally unique name (e.g. `casefile.create`).
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub classification: Classification,
    pub owner: OwnerRef,
    #[serde(default)]
    pub business_rules: MethodBusinessRules,
    pub request_model: String,
    pub response_model: String,
    /// Derived once from the request model's fields.
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

impl MethodDescriptor {
    pub fn builder(name: impl Into<String>, classification: Classification) -> MethodDescriptorBuilder {
        MethodDescriptorBuilder {
            descriptor: MethodDescriptor {
                name: name.into(),
                description: String::new(),
                classification,
                owner: OwnerRef::default(),
                business_rules: MethodBusinessRules::default(),
                request_model: String::new(),
                response_model: String::new(),
                parameters: Vec::new(),
            },
        }
    }

    pub fn is_deprecated(&self) -> bool {
        self.business_rules.deprecation.is_some()
    }

    /// Check a caller's permission set against the method's requirements.
    pub fn permits(&self, granted: &[String]) -> bool {
        self.business_rules
            .required_permissions
            .iter()
            .all(|required| granted.contains(required))
    }
}

/// Builder for [`MethodDescriptor`].
#[derive(Debug, Clone)]
pub struct MethodDescriptorBuilder {
    descriptor: MethodDescriptor,
}

impl MethodDescriptorBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.descriptor.description = description.into();
        self
    }

    pub fn owner(mut self, owner: OwnerRef) -> Self {
        self.descriptor.owner = owner;
        self
    }

    pub fn permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.descriptor.business_rules.required_permissions =
            permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.descriptor.business_rules.idempotent = idempotent;
        self
    }

    pub fn transactional(mut self, transactional: bool) -> Self {
        self.descriptor.business_rules.transactional = transactional;
        self
    }

    pub fn deprecated(mut self, deprecation: Deprecation) -> Self {
        self.descriptor.business_rules.deprecation = Some(deprecation);
        self
    }

    /// Bind typed request/response models; parameters are derived from `Req`.
    pub fn models<Req: JsonSchema, Resp: JsonSchema>(mut self) -> Self {
        self.descriptor.request_model = Req::schema_name();
        self.descriptor.response_model = Resp::schema_name();
        self.descriptor.parameters = parameters_of::<Req>();
        self
    }

    pub fn build(self) -> MethodDescriptor {
        self.descriptor
    }
}

// ---------------------------------------------------------------------------
// Model catalog
// ---------------------------------------------------------------------------

/// Model names mapped to their derived parameter lists.
///
/// Lets a declarative record, which only names its request model, recover
/// the parameters without reflection.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: HashMap<String, Vec<ParameterSpec>>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under its schema name.
    pub fn register<T: JsonSchema>(&mut self) -> Result<String, HubError> {
        let name = T::schema_name();
        if self.models.contains_key(&name) {
            return Err(HubError::RegistrationConflict {
                kind: RegistryKind::Model,
                name,
            });
        }
        self.models.insert(name.clone(), parameters_of::<T>());
        Ok(name)
    }

    pub fn parameters(&self, model: &str) -> Option<&[ParameterSpec]> {
        self.models.get(model).map(Vec::as_slice)
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Declarative records
// ---------------------------------------------------------------------------

/// One flat declarative capability record.
///
/// Classification fields stay strings so unknown values can be reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRecord {
    pub name: String,
    pub domain: String,
    pub subdomain: String,
    pub capability: String,
    #[serde(default = "default_complexity")]
    pub complexity: String,
    #[serde(default = "default_maturity")]
    pub maturity: String,
    #[serde(default = "default_integration_tier")]
    pub integration_tier: String,
    pub service: String,
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub function: String,
    #[serde(default)]
    pub required_permissions: Vec<String>,
    pub request_model: String,
    pub response_model: String,
}

fn default_complexity() -> String {
    "atomic".to_string()
}

fn default_maturity() -> String {
    "stable".to_string()
}

fn default_integration_tier() -> String {
    "internal".to_string()
}

/// Why a declarative record could not become a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RecordIssue {
    Classification(ClassificationIssue),
    UnknownRequestModel(String),
}

impl std::fmt::Display for RecordIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classification(issue) => write!(f, "{}", issue),
            Self::UnknownRequestModel(model) => write!(f, "unknown request model '{}'", model),
        }
    }
}

impl CapabilityRecord {
    /// Parse the classification axes only.
    pub fn classification(&self) -> Result<Classification, Vec<ClassificationIssue>> {
        Classification::parse(
            &self.domain,
            &self.subdomain,
            &self.capability,
            &self.complexity,
            &self.maturity,
            &self.integration_tier,
        )
    }

    /// Resolve into a descriptor, collecting every issue.
    pub fn to_descriptor(&self, models: &ModelCatalog) -> Result<MethodDescriptor, Vec<RecordIssue>> {
        let mut issues: Vec<RecordIssue> = Vec::new();
        let classification = match self.classification() {
            Ok(c) => Some(c),
            Err(found) => {
                issues.extend(found.into_iter().map(RecordIssue::Classification));
                None
            }
        };
        let parameters = models.parameters(&self.request_model);
        if parameters.is_none() {
            issues.push(RecordIssue::UnknownRequestModel(self.request_model.clone()));
        }

        match (classification, parameters) {
            (Some(classification), Some(parameters)) if issues.is_empty() => Ok(MethodDescriptor {
                name: self.name.clone(),
                description: String::new(),
                classification,
                owner: OwnerRef::new(&self.service, &self.module, &self.function),
                business_rules: MethodBusinessRules {
                    required_permissions: self.required_permissions.clone(),
                    ..Default::default()
                },
                request_model: self.request_model.clone(),
                response_model: self.response_model.clone(),
                parameters: parameters.to_vec(),
            }),
            _ => Err(issues),
        }
    }

    /// Parse a `capabilities:` list from YAML.
    pub fn list_from_yaml(yaml: &str) -> Result<Vec<Self>, HubError> {
        let wrapper: CapabilityListWrapper = serde_yaml::from_str(yaml)?;
        Ok(wrapper.capabilities)
    }

    pub fn list_from_yaml_file(path: impl AsRef<Path>) -> Result<Vec<Self>, HubError> {
        let content = std::fs::read_to_string(path)?;
        Self::list_from_yaml(&content)
    }
}

/// Wrapper for YAML deserialization (records are nested under `capabilities:`).
#[derive(Debug, Deserialize)]
struct CapabilityListWrapper {
    capabilities: Vec<CapabilityRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::classification::{CapabilityVerb, Domain, Subdomain};
    use std::io::Write;

    #[allow(dead_code)]
    #[derive(JsonSchema)]
    struct EchoRequest {
        message: String,
    }

    #[allow(dead_code)]
    #[derive(JsonSchema)]
    struct EchoResponse {
        message: String,
    }

    const YAML: &str = r#"
capabilities:
  - name: "utilities.echo"
    domain: utilities
    subdomain: context
    capability: process
    service: "EchoService"
    function: "echo"
    required_permissions: ["echo:use"]
    request_model: "EchoRequest"
    response_model: "EchoResponse"
  - name: "utilities.broken"
    domain: galaxy
    subdomain: context
    capability: teleport
    service: "EchoService"
    request_model: "Missing"
    response_model: "EchoResponse"
"#;

    #[test]
    fn test_builder_derives_parameters() {
        let method = MethodDescriptor::builder(
            "utilities.echo",
            Classification::atomic(Domain::Utilities, Subdomain::Context, CapabilityVerb::Process),
        )
        .owner(OwnerRef::new("EchoService", "echo", "echo"))
        .permissions(["echo:use"])
        .idempotent(true)
        .models::<EchoRequest, EchoResponse>()
        .build();

        assert_eq!(method.request_model, "EchoRequest");
        assert_eq!(method.response_model, "EchoResponse");
        assert_eq!(method.parameters.len(), 1);
        assert!(method.parameters[0].required);
        assert!(method.permits(&["echo:use".to_string()]));
        assert!(!method.permits(&[]));
        assert!(!method.is_deprecated());
    }

    #[test]
    fn test_record_resolution() {
        let mut models = ModelCatalog::new();
        models.register::<EchoRequest>().unwrap();

        let records = CapabilityRecord::list_from_yaml(YAML).unwrap();
        assert_eq!(records.len(), 2);

        let method = records[0].to_descriptor(&models).unwrap();
        assert_eq!(method.owner.service, "EchoService");
        assert_eq!(method.classification.domain, Domain::Utilities);
        assert_eq!(method.business_rules.required_permissions, vec!["echo:use"]);
        assert_eq!(method.parameters[0].name, "message");

        let issues = records[1].to_descriptor(&models).unwrap_err();
        assert_eq!(issues.len(), 3);
        assert!(issues.contains(&RecordIssue::UnknownRequestModel("Missing".into())));
    }

    #[test]
    fn test_record_issues_serialize_for_reports() {
        let issue = RecordIssue::Classification(ClassificationIssue {
            field: "domain",
            value: "galaxy".into(),
        });
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["Classification"]["field"], "domain");
        assert_eq!(value["Classification"]["value"], "galaxy");
        assert_eq!(issue.to_string(), "unknown domain 'galaxy'");
    }

    #[test]
    fn test_model_catalog_rejects_duplicates() {
        let mut models = ModelCatalog::new();
        models.register::<EchoRequest>().unwrap();
        let err = models.register::<EchoRequest>().unwrap_err();
        assert!(matches!(err, HubError::RegistrationConflict { kind: RegistryKind::Model, .. }));
        assert_eq!(models.len(), 1);
    }

    #[test]
    fn test_list_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();
        let records = CapabilityRecord::list_from_yaml_file(file.path()).unwrap();
        assert_eq!(records[1].complexity, "atomic");
        assert_eq!(records[1].maturity, "stable");
    }
}
