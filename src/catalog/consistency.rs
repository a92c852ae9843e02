//! Cross-registry consistency pass.
//!
//! Reports, never throws. [`ConsistencyReport::enforce`] escalates errors to
//! `HubError::Consistency` only in strict mode.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::Catalog;
use crate::error::HubError;

/// Tool names that read like a method binding (`create_casefile`,
/// `get_session_tool`, ...).
static METHOD_STYLE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((create|get|read|update|delete|list|search|add|link|process|execute)_[a-z0-9_]+|[a-z0-9_]+_tool)$")
        .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ConsistencyIssue {
    /// A tool's `method_name` does not resolve.
    DanglingMethodRef { tool: String, method: String },
    /// A method no tool is bound to.
    OrphanMethod { method: String },
    /// A standalone tool whose name suggests it should be bound.
    UnboundMethodStyleTool { tool: String },
    /// A method the hub has no operation for.
    UnroutedMethod { method: String },
}

impl ConsistencyIssue {
    pub fn severity(&self) -> Severity {
        match self {
            Self::DanglingMethodRef { .. } => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingMethodRef { tool, method } => {
                write!(f, "tool '{}' is bound to unknown method '{}'", tool, method)
            }
            Self::OrphanMethod { method } => write!(f, "method '{}' has no bound tool", method),
            Self::UnboundMethodStyleTool { tool } => {
                write!(f, "tool '{}' looks method-backed but has no method binding", tool)
            }
            Self::UnroutedMethod { method } => write!(f, "method '{}' has no hub operation", method),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    pub issues: Vec<ConsistencyIssue>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ConsistencyIssue> {
        self.issues.iter().filter(|i| i.severity() == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ConsistencyIssue> {
        self.issues.iter().filter(|i| i.severity() == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Log every issue; in strict mode, fail on errors.
    pub fn enforce(&self, strict: bool) -> Result<(), HubError> {
        for issue in &self.issues {
            match issue.severity() {
                Severity::Error => log::warn!("Consistency error: {}", issue),
                Severity::Warning => log::info!("Consistency warning: {}", issue),
            }
        }
        if strict && self.has_errors() {
            let messages: Vec<String> = self.errors().map(ToString::to_string).collect();
            return Err(HubError::Consistency(messages.join("; ")));
        }
        Ok(())
    }
}

/// Walk both registries. `operations` are the names the hub can dispatch;
/// pass an empty slice to skip the routing check.
pub fn check_consistency(catalog: &Catalog, operations: &[&str]) -> ConsistencyReport {
    let mut issues = Vec::new();

    for tool in catalog.tools().list() {
        match tool.method_name.as_deref().filter(|m| !m.is_empty()) {
            Some(method) if !catalog.methods().exists(method) => {
                issues.push(ConsistencyIssue::DanglingMethodRef {
                    tool: tool.metadata.name.clone(),
                    method: method.to_string(),
                });
            }
            Some(_) => {}
            None if METHOD_STYLE_NAME.is_match(&tool.metadata.name) => {
                issues.push(ConsistencyIssue::UnboundMethodStyleTool {
                    tool: tool.metadata.name.clone(),
                });
            }
            None => {}
        }
    }

    for method in catalog.methods().list() {
        if catalog.tools_for_method(&method.name).is_empty() {
            issues.push(ConsistencyIssue::OrphanMethod {
                method: method.name.clone(),
            });
        }
        if !operations.is_empty() && !operations.contains(&method.name.as_str()) {
            issues.push(ConsistencyIssue::UnroutedMethod {
                method: method.name.clone(),
            });
        }
    }

    ConsistencyReport { issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{CapabilityVerb, Classification, Domain, MethodDescriptor, Subdomain};
    use crate::catalog::CatalogBuilder;
    use crate::tools::ToolDescriptor;

    fn method(name: &str) -> MethodDescriptor {
        MethodDescriptor::builder(
            name,
            Classification::atomic(Domain::Workspace, Subdomain::Casefile, CapabilityVerb::Create),
        )
        .build()
    }

    fn catalog() -> Catalog {
        let mut builder = CatalogBuilder::new();
        builder.register_method(method("casefile.create")).unwrap();
        builder.register_method(method("casefile.get")).unwrap();
        builder
            .register_tool(ToolDescriptor::builder("create_casefile_tool").method_name("casefile.create").build())
            .unwrap();
        builder
            .register_tool(ToolDescriptor::builder("archive_tool").method_name("casefile.archive").build())
            .unwrap();
        builder.register_tool(ToolDescriptor::builder("delete_casefile").build()).unwrap();
        builder.register_tool(ToolDescriptor::builder("word_count").build()).unwrap();
        builder.build()
    }

    #[test]
    fn test_reports_every_issue_kind() {
        let report = check_consistency(&catalog(), &["casefile.create"]);

        assert!(report.issues.contains(&ConsistencyIssue::DanglingMethodRef {
            tool: "archive_tool".into(),
            method: "casefile.archive".into(),
        }));
        assert!(report.issues.contains(&ConsistencyIssue::OrphanMethod {
            method: "casefile.get".into()
        }));
        assert!(report.issues.contains(&ConsistencyIssue::UnboundMethodStyleTool {
            tool: "delete_casefile".into()
        }));
        assert!(report.issues.contains(&ConsistencyIssue::UnroutedMethod {
            method: "casefile.get".into()
        }));
        assert!(!report
            .issues
            .iter()
            .any(|i| matches!(i, ConsistencyIssue::UnboundMethodStyleTool { tool } if tool == "word_count")));
        assert_eq!(report.errors().count(), 1);
    }

    #[test]
    fn test_enforce_only_fails_when_strict() {
        let report = check_consistency(&catalog(), &[]);
        assert!(report.enforce(false).is_ok());
        let err = report.enforce(true).unwrap_err();
        assert!(err.to_string().contains("casefile.archive"));
    }

    #[test]
    fn test_warnings_never_fail_strict() {
        let mut builder = CatalogBuilder::new();
        builder.register_method(method("casefile.get")).unwrap();
        let report = check_consistency(&builder.build(), &[]);
        assert!(!report.is_clean());
        assert!(report.enforce(true).is_ok());
    }
}
