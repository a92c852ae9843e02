//! # Capability catalog
//!
//! The method registry, tool registry and model catalog, populated once at
//! startup and then frozen.
//!
//! ## Architecture
//!
//! ```text
//! CatalogBuilder ──register_*──► (mutable registries)
//!        │ build()
//!        ▼
//!     Catalog   (read-only)
//!        │
//!        ▼
//!  SharedCatalog ── snapshot() → Arc<Catalog>   (per call, lock held only for the clone)
//!                └─ publish(Catalog)            (atomic swap after a reload)
//! ```
//!
//! Every registration returns `Result<(), HubError>`, so a duplicate surfaces
//! at the call that caused it instead of silently replacing an entry.

pub mod builtin;
pub mod consistency;
pub mod drift;

use std::sync::Arc;

use parking_lot::RwLock;
use schemars::JsonSchema;

use crate::capabilities::{CapabilityRecord, MethodDescriptor, MethodRegistry, ModelCatalog};
use crate::error::HubError;
use crate::tools::{ToolDescriptor, ToolFilter, ToolRegistry};

pub use builtin::{
    builtin_catalog, builtin_records, ADD_SESSION_TO_CASEFILE, BUILTIN_CAPABILITIES_YAML, CREATE_CASEFILE,
    CREATE_CASEFILE_WITH_SESSION, CREATE_SESSION, GET_CASEFILE, PROCESS_CHAT,
};
pub use consistency::{check_consistency, ConsistencyIssue, ConsistencyReport, Severity};
pub use drift::{diff, Discrepancy, DriftReport};

/// Frozen registries. Only read access is exposed.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    methods: MethodRegistry,
    tools: ToolRegistry,
    models: ModelCatalog,
}

impl Catalog {
    pub fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn models(&self) -> &ModelCatalog {
        &self.models
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// Tools bound to `method`.
    pub fn tools_for_method(&self, method: &str) -> Vec<&ToolDescriptor> {
        self.tools.list_by(ToolFilter::Method(method))
    }

    /// Reopen for modification. The original snapshot is untouched.
    pub fn to_builder(&self) -> CatalogBuilder {
        CatalogBuilder {
            methods: self.methods.clone(),
            tools: self.tools.clone(),
            models: self.models.clone(),
        }
    }
}

/// Mutable registries used during startup.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    methods: MethodRegistry,
    tools: ToolRegistry,
    models: ModelCatalog,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request/response model under its schema name.
    pub fn register_model<T: JsonSchema>(&mut self) -> Result<String, HubError> {
        self.models.register::<T>()
    }

    pub fn register_method(&mut self, method: MethodDescriptor) -> Result<(), HubError> {
        self.methods.register(method)
    }

    pub fn unregister_method(&mut self, name: &str) -> Option<MethodDescriptor> {
        self.methods.unregister(name)
    }

    pub fn register_tool(&mut self, tool: ToolDescriptor) -> Result<(), HubError> {
        self.tools.register(tool)
    }

    pub fn unregister_tool(&mut self, name: &str) -> Option<ToolDescriptor> {
        self.tools.unregister(name)
    }

    /// Resolve a declarative record against the registered models and
    /// register the resulting method.
    pub fn register_record(&mut self, record: &CapabilityRecord) -> Result<(), HubError> {
        let method = record.to_descriptor(&self.models).map_err(|issues| {
            let reasons: Vec<String> = issues.iter().map(ToString::to_string).collect();
            HubError::Config(format!("capability record '{}': {}", record.name, reasons.join("; ")))
        })?;
        self.register_method(method)
    }

    /// Register every record, returning one outcome per record in order.
    pub fn register_records(&mut self, records: &[CapabilityRecord]) -> Vec<(String, Result<(), HubError>)> {
        records
            .iter()
            .map(|record| (record.name.clone(), self.register_record(record)))
            .collect()
    }

    pub fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn models(&self) -> &ModelCatalog {
        &self.models
    }

    /// Freeze. Nothing can be registered into the returned catalog.
    pub fn build(self) -> Catalog {
        log::info!(
            "Catalog built: {} methods, {} tools, {} models",
            self.methods.len(),
            self.tools.len(),
            self.models.len()
        );
        Catalog {
            methods: self.methods,
            tools: self.tools,
            models: self.models,
        }
    }
}

/// Shared handle to the current catalog snapshot.
#[derive(Debug, Clone)]
pub struct SharedCatalog {
    current: Arc<RwLock<Arc<Catalog>>>,
}

impl SharedCatalog {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(catalog))),
        }
    }

    /// The current snapshot. Stays valid across later `publish` calls.
    pub fn snapshot(&self) -> Arc<Catalog> {
        self.current.read().clone()
    }

    /// Swap in a new snapshot, returning the previous one.
    pub fn publish(&self, catalog: Catalog) -> Arc<Catalog> {
        let next = Arc::new(catalog);
        std::mem::replace(&mut *self.current.write(), next)
    }
}

impl From<Catalog> for SharedCatalog {
    fn from(catalog: Catalog) -> Self {
        Self::new(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{CapabilityVerb, Classification, Domain, Subdomain};
    use crate::error::RegistryKind;

    fn method(name: &str) -> MethodDescriptor {
        MethodDescriptor::builder(
            name,
            Classification::atomic(Domain::Workspace, Subdomain::Casefile, CapabilityVerb::Create),
        )
        .build()
    }

    #[test]
    fn test_builder_reports_conflicts_per_call() {
        let mut builder = CatalogBuilder::new();
        assert!(builder.register_method(method("casefile.create")).is_ok());
        let err = builder.register_method(method("casefile.create")).unwrap_err();
        assert!(matches!(err, HubError::RegistrationConflict { kind: RegistryKind::Method, .. }));

        let catalog = builder.build();
        assert_eq!(catalog.methods().len(), 1);
    }

    #[test]
    fn test_record_with_unknown_model_is_config_error() {
        let yaml = r#"
capabilities:
  - name: casefile.archive
    domain: workspace
    subdomain: casefile
    capability: update
    service: CasefileService
    request_model: ArchiveCasefileRequest
    response_model: ArchiveCasefileResponse
"#;
        let records = CapabilityRecord::list_from_yaml(yaml).unwrap();
        let mut builder = CatalogBuilder::new();
        let outcomes = builder.register_records(&records);
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].1, Err(HubError::Config(ref m)) if m.contains("ArchiveCasefileRequest")));
        assert!(builder.methods().is_empty());
    }

    #[test]
    fn test_snapshot_survives_publish() {
        let mut builder = CatalogBuilder::new();
        builder.register_method(method("casefile.create")).unwrap();
        let shared = SharedCatalog::new(builder.build());

        let before = shared.snapshot();
        let mut next = before.to_builder();
        next.register_method(method("casefile.archive")).unwrap();
        let previous = shared.publish(next.build());

        assert_eq!(before.methods().len(), 1);
        assert_eq!(previous.methods().len(), 1);
        assert_eq!(shared.snapshot().methods().len(), 2);
    }
}
