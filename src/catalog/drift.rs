//! Declarative-vs-registered drift.
//!
//! [`diff`] is pure: it compares a declared record list with a method
//! registry and mutates neither. Whether drift blocks startup is decided by
//! the caller through [`DriftReport::enforce`].

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::capabilities::{CapabilityRecord, Classification, MethodDescriptor, MethodRegistry};
use crate::error::HubError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    /// Declared but never registered.
    DeclaredOnly { method: String },
    /// Registered but not declared.
    RegisteredOnly { method: String },
    FieldMismatch {
        method: String,
        field: String,
        declared: String,
        registered: String,
    },
    /// The declared record itself is malformed.
    InvalidRecord { method: String, issues: Vec<String> },
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeclaredOnly { method } => write!(f, "'{}' is declared but not registered", method),
            Self::RegisteredOnly { method } => write!(f, "'{}' is registered but not declared", method),
            Self::FieldMismatch {
                method,
                field,
                declared,
                registered,
            } => write!(
                f,
                "'{}'.{}: declared '{}', registered '{}'",
                method, field, declared, registered
            ),
            Self::InvalidRecord { method, issues } => {
                write!(f, "'{}' is invalid: {}", method, issues.join("; "))
            }
        }
    }
}

/// Compare `declared` against `registered`.
///
/// Output order: declared records in input order, then registered-only
/// methods by name. A duplicate declared name is reported once as invalid.
pub fn diff(declared: &[CapabilityRecord], registered: &MethodRegistry) -> Vec<Discrepancy> {
    let mut out = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for record in declared {
        if !seen.insert(record.name.as_str()) {
            out.push(Discrepancy::InvalidRecord {
                method: record.name.clone(),
                issues: vec!["declared more than once".to_string()],
            });
            continue;
        }

        let declared_class = match record.classification() {
            Ok(classification) => classification,
            Err(issues) => {
                out.push(Discrepancy::InvalidRecord {
                    method: record.name.clone(),
                    issues: issues.iter().map(ToString::to_string).collect(),
                });
                continue;
            }
        };

        match registered.get(&record.name) {
            None => out.push(Discrepancy::DeclaredOnly {
                method: record.name.clone(),
            }),
            Some(method) => compare_fields(record, &declared_class, method, &mut out),
        }
    }

    for name in registered.names() {
        if !seen.contains(name) {
            out.push(Discrepancy::RegisteredOnly {
                method: name.to_string(),
            });
        }
    }

    out
}

fn compare_fields(
    record: &CapabilityRecord,
    declared_class: &Classification,
    method: &MethodDescriptor,
    out: &mut Vec<Discrepancy>,
) {
    let c = &method.classification;
    let mut mismatch = |field: &str, declared: &str, registered: &str| {
        out.push(Discrepancy::FieldMismatch {
            method: record.name.clone(),
            field: field.to_string(),
            declared: declared.to_string(),
            registered: registered.to_string(),
        });
    };

    // Axes are compared in parsed form, so spelling variants the parser
    // accepts (case, `-` for `_`) are not drift.
    if declared_class.domain != c.domain {
        mismatch("domain", &record.domain, c.domain.as_str());
    }
    if declared_class.subdomain != c.subdomain {
        mismatch("subdomain", &record.subdomain, c.subdomain.as_str());
    }
    if declared_class.capability != c.capability {
        mismatch("capability", &record.capability, c.capability.as_str());
    }
    if declared_class.complexity != c.complexity {
        mismatch("complexity", &record.complexity, c.complexity.as_str());
    }
    if declared_class.maturity != c.maturity {
        mismatch("maturity", &record.maturity, c.maturity.as_str());
    }
    if declared_class.integration_tier != c.integration_tier {
        mismatch("integration_tier", &record.integration_tier, c.integration_tier.as_str());
    }

    let mut check = |field: &str, declared: &str, registered: &str| {
        if !declared.trim().eq_ignore_ascii_case(registered) {
            mismatch(field, declared, registered);
        }
    };
    check("service", &record.service, &method.owner.service);
    // Empty module/function in a record means "not declared".
    if !record.module.is_empty() {
        check("module", &record.module, &method.owner.module);
    }
    if !record.function.is_empty() {
        check("function", &record.function, &method.owner.function);
    }
    check("request_model", &record.request_model, &method.request_model);
    check("response_model", &record.response_model, &method.response_model);

    let mut declared_perms = record.required_permissions.clone();
    let mut registered_perms = method.business_rules.required_permissions.clone();
    declared_perms.sort();
    registered_perms.sort();
    if declared_perms != registered_perms {
        check(
            "required_permissions",
            &declared_perms.join(","),
            &registered_perms.join(","),
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    pub discrepancies: Vec<Discrepancy>,
}

impl DriftReport {
    pub fn compute(declared: &[CapabilityRecord], registered: &MethodRegistry) -> Self {
        Self {
            discrepancies: diff(declared, registered),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }

    /// Log every discrepancy; in strict mode any discrepancy is fatal.
    pub fn enforce(&self, strict: bool) -> Result<(), HubError> {
        for d in &self.discrepancies {
            log::warn!("Capability drift: {}", d);
        }
        if strict && !self.is_clean() {
            let messages: Vec<String> = self.discrepancies.iter().map(ToString::to_string).collect();
            return Err(HubError::Consistency(format!("capability drift: {}", messages.join("; "))));
        }
        Ok(())
    }
}
