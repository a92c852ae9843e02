//! # capability-hub
//!
//! Capability registry, tool invocation wrapper and request orchestration
//! hub for casefile, tool-session and chat services.
//!
//! - [`capabilities`]: classified method descriptors and their registry
//! - [`tools`]: tool descriptors, registry and the invocation wrapper
//! - [`catalog`]: startup builder, frozen snapshot, consistency and drift
//! - [`policy`]: named bundles of default context requirements and hooks
//! - [`contract`]: request/response envelopes and operation payloads
//! - [`hooks`]: pre/post dispatch hooks
//! - [`services`]: collaborator interfaces and in-memory implementations
//! - [`orchestrator`]: the request hub
//!
//! ```no_run
//! use std::sync::Arc;
//! use capability_hub::{HubConfig, InMemoryStore, RequestEnvelope, RequestHub};
//!
//! # async fn run() -> Result<(), capability_hub::HubError> {
//! let hub = RequestHub::in_memory(Arc::new(InMemoryStore::new()), HubConfig::default())?;
//! let request = RequestEnvelope::new("casefile.create", serde_json::json!({"title": "Incident 7"}))
//!     .with_hooks(["metrics", "audit"]);
//! let response = hub.dispatch(request).await?;
//! assert!(response.is_completed());
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod catalog;
pub mod config;
pub mod contract;
pub mod error;
pub mod hooks;
pub mod orchestrator;
pub mod policy;
pub mod services;
pub mod tools;

pub use capabilities::{MethodDescriptor, MethodRegistry};
pub use catalog::{Catalog, CatalogBuilder, SharedCatalog};
pub use config::HubConfig;
pub use contract::{ErrorInfo, RequestEnvelope, RequestStatus, ResponseEnvelope};
pub use error::{HubError, ValidationError};
pub use hooks::{HookHandler, HookRegistry};
pub use orchestrator::RequestHub;
pub use policy::PolicyLoader;
pub use services::{InMemoryStore, Services};
pub use tools::{ToolDescriptor, ToolInvoker, ToolRegistry};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
