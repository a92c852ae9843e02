//! Hub error taxonomy.
//!
//! Protocol and validation errors are raised before any side effect.
//! Execution errors carry a `kind` + `message` pair so callers can tell
//! "your input was wrong" apart from "the system failed".

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the registries, the hub and configuration loading.
#[derive(Debug, Error)]
pub enum HubError {
    /// Unknown or unsupported operation. Never retried.
    #[error("Unsupported operation: {operation}")]
    Protocol { operation: String },

    /// A name was registered twice without an intervening unregister.
    #[error("{kind} already registered: {name}")]
    RegistrationConflict { kind: RegistryKind, name: String },

    /// Dangling reference, orphan, or drift escalated by a strict check.
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Parameter or payload schema violation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The underlying implementation failed.
    #[error("Execution error ({kind}): {message}")]
    Execution { kind: String, message: String },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML parsing failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HubError {
    pub fn protocol(operation: impl Into<String>) -> Self {
        Self::Protocol {
            operation: operation.into(),
        }
    }

    pub fn execution(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable kind, used in normalized error results.
    pub fn kind(&self) -> &str {
        match self {
            Self::Protocol { .. } => "protocol_error",
            Self::RegistrationConflict { .. } => "registration_conflict",
            Self::Consistency(_) => "consistency_error",
            Self::Validation(_) => "validation_error",
            Self::Execution { kind, .. } => kind,
            Self::Config(_) => "config_error",
            Self::Yaml(_) => "yaml_error",
            Self::Io(_) => "io_error",
        }
    }
}

/// Which registry rejected a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKind {
    Method,
    Tool,
    Model,
    Hook,
    Operation,
    Policy,
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Method => "Method",
            Self::Tool => "Tool",
            Self::Model => "Model",
            Self::Hook => "Hook",
            Self::Operation => "Operation",
            Self::Policy => "Policy",
        })
    }
}

/// A single field-level violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

/// Parameter schema violation. Collects every failing field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self {
            violations: Vec::new(),
        }
    }

    /// Shorthand for a single-field error.
    pub fn single(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut err = Self::new();
        err.push(field, reason);
        err
    }

    pub fn push(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.violations.push(FieldViolation {
            field: field.into(),
            reason: reason.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Whether any violation mentions `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Default for ValidationError {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed: ")?;
        let parts: Vec<String> = self
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.field, v.reason))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_names_operation() {
        let err = HubError::protocol("nonexistent_op");
        assert!(err.to_string().contains("nonexistent_op"));
        assert_eq!(err.kind(), "protocol_error");
    }

    #[test]
    fn test_validation_error_display_joins_fields() {
        let mut err = ValidationError::new();
        err.push("title", "is required");
        err.push("priority", "must be <= 5");
        let text = err.to_string();
        assert!(text.contains("title: is required"));
        assert!(text.contains("priority: must be <= 5"));
        assert!(err.has_field("priority"));
        assert!(!err.has_field("owner"));
    }

    #[test]
    fn test_execution_kind_passthrough() {
        let err = HubError::execution("timeout", "took too long");
        assert_eq!(err.kind(), "timeout");
        assert_eq!(err.to_string(), "Execution error (timeout): took too long");
    }

    #[test]
    fn test_conflict_message() {
        let err = HubError::RegistrationConflict {
            kind: RegistryKind::Tool,
            name: "create_casefile_tool".into(),
        };
        assert_eq!(err.to_string(), "Tool already registered: create_casefile_tool");
    }
}
