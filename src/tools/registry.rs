//! Tool Registry: keyed store of [`ToolDescriptor`]s.

use std::collections::BTreeMap;

use super::tool_def::ToolDescriptor;
use crate::error::{HubError, RegistryKind};

/// Filter accepted by [`ToolRegistry::list_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFilter<'a> {
    Category(&'a str),
    Tag(&'a str),
    /// Tools bound to the named method.
    Method(&'a str),
}

impl ToolFilter<'_> {
    fn matches(&self, tool: &ToolDescriptor) -> bool {
        match self {
            Self::Category(c) => tool.metadata.category == *c,
            Self::Tag(t) => tool.metadata.tags.iter().any(|tag| tag == t),
            Self::Method(m) => tool.method_name.as_deref() == Some(*m),
        }
    }
}

/// Tool registry. Iteration order is by name.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its metadata name. Never overwrites.
    pub fn register(&mut self, tool: ToolDescriptor) -> Result<(), HubError> {
        let name = tool.metadata.name.clone();
        if self.tools.contains_key(&name) {
            log::warn!("Rejected duplicate tool registration: {}", name);
            return Err(HubError::RegistrationConflict {
                kind: RegistryKind::Tool,
                name,
            });
        }
        log::debug!("Registered tool {} (method: {:?})", name, tool.method_name);
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> Option<ToolDescriptor> {
        self.tools.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list_by(&self, filter: ToolFilter<'_>) -> Vec<&ToolDescriptor> {
        self.tools.values().filter(|t| filter.matches(t)).collect()
    }

    pub fn list(&self) -> Vec<&ToolDescriptor> {
        self.tools.values().collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolDescriptor::builder("create_casefile_tool")
                    .category("casefile")
                    .tags(["write", "casefile"])
                    .method_name("casefile.create")
                    .build(),
            )
            .unwrap();
        registry
            .register(
                ToolDescriptor::builder("get_casefile_tool")
                    .category("casefile")
                    .tags(["read"])
                    .method_name("casefile.get")
                    .build(),
            )
            .unwrap();
        registry
            .register(ToolDescriptor::builder("word_count").category("text").build())
            .unwrap();
        registry
    }

    #[test]
    fn test_duplicate_rejected_state_unchanged() {
        let mut registry = registry();
        let dup = ToolDescriptor::builder("word_count").category("other").build();
        assert!(registry.register(dup).is_err());
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get("word_count").unwrap().metadata.category, "text");
    }

    #[test]
    fn test_filters() {
        let registry = registry();
        assert_eq!(registry.list_by(ToolFilter::Category("casefile")).len(), 2);
        assert_eq!(registry.list_by(ToolFilter::Tag("read")).len(), 1);
        assert_eq!(registry.list_by(ToolFilter::Method("casefile.create")).len(), 1);
        assert!(registry.list_by(ToolFilter::Category("nonexistent")).is_empty());
    }

    #[test]
    fn test_unregister_allows_reregistration() {
        let mut registry = registry();
        assert!(registry.unregister("word_count").is_some());
        assert!(!registry.exists("word_count"));
        registry
            .register(ToolDescriptor::builder("word_count").category("other").build())
            .unwrap();
        assert_eq!(registry.get("word_count").unwrap().metadata.category, "other");
    }
}
