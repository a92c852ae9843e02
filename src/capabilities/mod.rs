//! # Capability descriptor model
//!
//! Methods are declaratively classified units of business functionality
//! exposed by a service. This module holds their data shapes and the
//! Method Registry.
//!
//! ## Layout
//!
//! - [`classification`]: the six closed classification axes
//! - [`parameter`]: `ParameterSpec`, schema derivation, validation
//! - [`method`]: `MethodDescriptor`, declarative `CapabilityRecord`, `ModelCatalog`
//! - [`registry`]: `MethodRegistry` with filtered lookup

pub mod classification;
pub mod method;
pub mod parameter;
pub mod registry;

pub use classification::{
    CapabilityVerb, Classification, ClassificationIssue, Complexity, Domain, IntegrationTier,
    Maturity, Subdomain,
};
pub use method::{
    CapabilityRecord, Deprecation, MethodBusinessRules, MethodDescriptor, MethodDescriptorBuilder,
    ModelCatalog, OwnerRef, RecordIssue,
};
pub use parameter::{
    parameters_of, validate_parameters, ParameterSpec, ParameterType, ValidatedParams,
};
pub use registry::{MethodFilter, MethodRegistry};
