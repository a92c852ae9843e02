//! Method Registry: keyed store of [`MethodDescriptor`]s.
//!
//! Registration never overwrites: a second `register` under the same name
//! fails with a conflict and leaves the registry unchanged, unless the name
//! was explicitly unregistered first.

use std::collections::BTreeMap;

use super::classification::{CapabilityVerb, Domain, Subdomain};
use super::method::MethodDescriptor;
use crate::error::{HubError, RegistryKind};

/// Filter accepted by [`MethodRegistry::list_by`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter<'a> {
    Domain(Domain),
    Subdomain(Subdomain),
    Capability(CapabilityVerb),
    /// Owner service name (exact match).
    Service(&'a str),
}

impl<'a> MethodFilter<'a> {
    /// Build a filter from a `(field, value)` pair of strings.
    ///
    /// Unknown enumeration values produce `None`, which `list_by_str` maps
    /// to an empty result rather than an error.
    pub fn parse(field: &str, value: &'a str) -> Option<Self> {
        match field {
            "domain" => value.parse().ok().map(Self::Domain),
            "subdomain" => value.parse().ok().map(Self::Subdomain),
            "capability" => value.parse().ok().map(Self::Capability),
            "service" => Some(Self::Service(value)),
            _ => None,
        }
    }

    fn matches(&self, method: &MethodDescriptor) -> bool {
        let c = &method.classification;
        match self {
            Self::Domain(d) => c.domain == *d,
            Self::Subdomain(s) => c.subdomain == *s,
            Self::Capability(v) => c.capability == *v,
            Self::Service(name) => method.owner.service == *name,
        }
    }
}

/// Method registry. Iteration order is by name.
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    methods: BTreeMap<String, MethodDescriptor>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method under its own name.
    pub fn register(&mut self, method: MethodDescriptor) -> Result<(), HubError> {
        if self.methods.contains_key(&method.name) {
            log::warn!("Rejected duplicate method registration: {}", method.name);
            return Err(HubError::RegistrationConflict {
                kind: RegistryKind::Method,
                name: method.name,
            });
        }
        log::debug!("Registered method {}", method.name);
        self.methods.insert(method.name.clone(), method);
        Ok(())
    }

    /// Remove a method, returning it if it existed.
    pub fn unregister(&mut self, name: &str) -> Option<MethodDescriptor> {
        self.methods.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Methods matching `filter`. Empty when nothing matches.
    pub fn list_by(&self, filter: &MethodFilter<'_>) -> Vec<&MethodDescriptor> {
        self.methods.values().filter(|m| filter.matches(m)).collect()
    }

    /// String-keyed variant of [`list_by`](Self::list_by) for declarative
    /// callers. Unknown fields or values yield an empty list.
    pub fn list_by_str(&self, field: &str, value: &str) -> Vec<&MethodDescriptor> {
        match MethodFilter::parse(field, value) {
            Some(filter) => self.list_by(&filter),
            None => Vec::new(),
        }
    }

    pub fn list(&self) -> Vec<&MethodDescriptor> {
        self.methods.values().collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::classification::Classification;
    use crate::capabilities::method::OwnerRef;

    fn method(
        name: &str,
        domain: Domain,
        subdomain: Subdomain,
        verb: CapabilityVerb,
        service: &str,
    ) -> MethodDescriptor {
        MethodDescriptor::builder(name, Classification::atomic(domain, subdomain, verb))
            .owner(OwnerRef::new(service, "", ""))
            .build()
    }

    fn registry() -> MethodRegistry {
        use CapabilityVerb::{Create, Process, Read};

        let mut registry = MethodRegistry::new();
        for (name, domain, subdomain, verb, service) in [
            ("casefile.create", Domain::Workspace, Subdomain::Casefile, Create, "CasefileService"),
            ("casefile.get", Domain::Workspace, Subdomain::Casefile, Read, "CasefileService"),
            ("chat.process", Domain::Communication, Subdomain::Chat, Process, "CommunicationService"),
        ] {
            registry.register(method(name, domain, subdomain, verb, service)).unwrap();
        }
        registry
    }

    #[test]
    fn test_register_and_get() {
        let registry = registry();
        assert_eq!(registry.len(), 3);
        assert!(registry.exists("casefile.create"));
        assert_eq!(registry.get("chat.process").unwrap().owner.service, "CommunicationService");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_is_conflict_and_state_unchanged() {
        let mut registry = registry();
        let replacement = method("casefile.create", Domain::Automation, Subdomain::Workflow, CapabilityVerb::Execute, "Other");

        let err = registry.register(replacement).unwrap_err();
        assert!(matches!(err, HubError::RegistrationConflict { kind: RegistryKind::Method, ref name } if name == "casefile.create"));
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get("casefile.create").unwrap().owner.service, "CasefileService");
    }

    #[test]
    fn test_unregister_then_register() {
        let mut registry = registry();
        assert!(registry.unregister("casefile.create").is_some());
        assert!(!registry.exists("casefile.create"));

        let replacement = method("casefile.create", Domain::Workspace, Subdomain::Casefile, CapabilityVerb::Create, "CasefileServiceV2");
        registry.register(replacement).unwrap();
        assert_eq!(registry.get("casefile.create").unwrap().owner.service, "CasefileServiceV2");
    }

    #[test]
    fn test_list_by_filters() {
        let registry = registry();
        assert_eq!(registry.list_by(&MethodFilter::Domain(Domain::Workspace)).len(), 2);
        assert_eq!(registry.list_by(&MethodFilter::Subdomain(Subdomain::Chat)).len(), 1);
        assert_eq!(registry.list_by(&MethodFilter::Capability(CapabilityVerb::Read)).len(), 1);
        assert_eq!(registry.list_by(&MethodFilter::Service("CasefileService")).len(), 2);
        assert!(registry.list_by(&MethodFilter::Domain(Domain::Automation)).is_empty());
    }

    #[test]
    fn test_list_by_unknown_values_is_empty() {
        let registry = registry();
        assert!(registry.list_by_str("domain", "nonexistent").is_empty());
        assert!(registry.list_by_str("service", "NoSuchService").is_empty());
        assert!(registry.list_by_str("color", "blue").is_empty());
        assert_eq!(registry.list_by_str("domain", "communication").len(), 1);
    }

    #[test]
    fn test_names_are_sorted() {
        let registry = registry();
        assert_eq!(registry.names(), vec!["casefile.create", "casefile.get", "chat.process"]);
    }
}
