//! Closed classification enumerations for method descriptors.
//!
//! Every classification axis is a fixed set. Declarative records carry the
//! axes as strings; parsing an unknown value yields a [`ClassificationIssue`]
//! that the caller reports instead of coercing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unknown value for one classification axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationIssue {
    pub field: &'static str,
    pub value: String,
}

impl fmt::Display for ClassificationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.field, self.value)
    }
}

macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every member of the enumeration, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Axis name used in issue reports.
            pub const FIELD: &'static str = $field;

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ClassificationIssue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
                match normalized.as_str() {
                    $( $text => Ok($name::$variant), )+
                    _ => Err(ClassificationIssue {
                        field: $field,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

closed_enum! {
    /// Top-level business domain.
    Domain, "domain" {
        Workspace => "workspace",
        Communication => "communication",
        Automation => "automation",
        Utilities => "utilities",
    }
}

closed_enum! {
    /// Resource family inside a domain.
    Subdomain, "subdomain" {
        Casefile => "casefile",
        ToolSession => "tool_session",
        Chat => "chat",
        Workflow => "workflow",
        Context => "context",
    }
}

closed_enum! {
    /// What the capability does to its resource.
    CapabilityVerb, "capability" {
        Create => "create",
        Read => "read",
        Update => "update",
        Delete => "delete",
        List => "list",
        Search => "search",
        Link => "link",
        Process => "process",
        Execute => "execute",
    }
}

closed_enum! {
    Complexity, "complexity" {
        /// One service call.
        Atomic => "atomic",
        /// Several service calls sequenced by the hub.
        Composite => "composite",
        Pipeline => "pipeline",
    }
}

closed_enum! {
    Maturity, "maturity" {
        Experimental => "experimental",
        Beta => "beta",
        Stable => "stable",
        Deprecated => "deprecated",
    }
}

closed_enum! {
    /// How far the capability reaches outside the process.
    IntegrationTier, "integration_tier" {
        Internal => "internal",
        Hybrid => "hybrid",
        External => "external",
    }
}

/// The full classification of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub domain: Domain,
    pub subdomain: Subdomain,
    pub capability: CapabilityVerb,
    pub complexity: Complexity,
    pub maturity: Maturity,
    pub integration_tier: IntegrationTier,
}

impl Classification {
    /// Atomic, stable, internal capability, the common case.
    pub fn atomic(domain: Domain, subdomain: Subdomain, capability: CapabilityVerb) -> Self {
        Self {
            domain,
            subdomain,
            capability,
            complexity: Complexity::Atomic,
            maturity: Maturity::Stable,
            integration_tier: IntegrationTier::Internal,
        }
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_maturity(mut self, maturity: Maturity) -> Self {
        self.maturity = maturity;
        self
    }

    pub fn with_integration_tier(mut self, tier: IntegrationTier) -> Self {
        self.integration_tier = tier;
        self
    }

    /// Parse all six axes from strings, collecting every unknown value.
    pub fn parse(
        domain: &str,
        subdomain: &str,
        capability: &str,
        complexity: &str,
        maturity: &str,
        integration_tier: &str,
    ) -> Result<Self, Vec<ClassificationIssue>> {
        let mut issues = Vec::new();
        let domain = collect(domain.parse::<Domain>(), &mut issues);
        let subdomain = collect(subdomain.parse::<Subdomain>(), &mut issues);
        let capability = collect(capability.parse::<CapabilityVerb>(), &mut issues);
        let complexity = collect(complexity.parse::<Complexity>(), &mut issues);
        let maturity = collect(maturity.parse::<Maturity>(), &mut issues);
        let integration_tier = collect(integration_tier.parse::<IntegrationTier>(), &mut issues);

        match (domain, subdomain, capability, complexity, maturity, integration_tier) {
            (Some(domain), Some(subdomain), Some(capability), Some(complexity), Some(maturity), Some(integration_tier))
                if issues.is_empty() =>
            {
                Ok(Self {
                    domain,
                    subdomain,
                    capability,
                    complexity,
                    maturity,
                    integration_tier,
                })
            }
            _ => Err(issues),
        }
    }
}

fn collect<T>(parsed: Result<T, ClassificationIssue>, issues: &mut Vec<ClassificationIssue>) -> Option<T> {
    match parsed {
        Ok(value) => Some(value),
        Err(issue) => {
            issues.push(issue);
            None
        }
    }
}
