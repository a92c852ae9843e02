//! # Tools
//!
//! Invocable wrappers around capabilities (or standalone functions) with
//! their own parameter schema and safety/business rules.
//!
//! - [`tool_def`]: `ToolDescriptor`, its metadata and business rules
//! - [`registry`]: `ToolRegistry`
//! - [`rate_limit`]: per-tool minute/hour windows
//! - [`invoker`]: `ToolInvoker`: authorize, validate, dry-run, execute

pub mod invoker;
pub mod rate_limit;
pub mod registry;
pub mod tool_def;

pub use invoker::{
    CallerContext, InvokeOptions, MethodExecutor, ToolError, ToolInvoker, ToolResult, ToolStatus,
};
pub use rate_limit::RateLimiter;
pub use registry::{ToolFilter, ToolRegistry};
pub use tool_def::{
    implementation, ToolBusinessRules, ToolDescriptor, ToolDescriptorBuilder, ToolImplementation,
    ToolMetadata,
};
