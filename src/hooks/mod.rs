//! # Dispatch hooks
//!
//! Named handlers invoked at two fixed stages of every dispatch: `pre`
//! (after context preparation) and `post` (after the core operation, with
//! the response). Hooks observe; they cannot veto or rewrite a request.
//!
//! ## Architecture
//!
//! ```text
//! RequestHub.dispatch
//!   ├─ prepare_context        → ctx.hooks = dedupe(policy hooks ++ request hooks)
//!   ├─ for name in ctx.hooks  → HookRegistry.get(name)?.run(Pre, ctx, None)
//!   ├─ core operation
//!   └─ for name in ctx.hooks  → HookRegistry.get(name)?.run(Post, ctx, Some(response))
//! ```
//!
//! The registry is fixed once the hub is constructed. Names it does not know
//! contribute no events.

pub mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contract::{RequestStatus, ResponseEnvelope};
use crate::error::{HubError, RegistryKind};
use crate::orchestrator::DispatchContext;

pub use builtin::{AuditHook, MetricsHook, AUDIT_HOOK, METRICS_HOOK};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookStage {
    Pre,
    Post,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pre => "pre",
            Self::Post => "post",
        })
    }
}

/// One hook invocation, recorded in `ctx.hook_events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookEvent {
    pub hook: String,
    pub stage: HookStage,
    pub operation: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status: Option<RequestStatus>,
}

/// One audit record, recorded in `ctx.audit_log`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub operation: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub stage: HookStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
    pub timestamp: DateTime<Utc>,
}

/// A named dispatch hook.
pub trait HookHandler: Send + Sync {
    fn name(&self) -> &str;

    /// `response` is `None` at the pre stage.
    fn run(&self, stage: HookStage, ctx: &mut DispatchContext, response: Option<&ResponseEnvelope>);
}

/// Hook handlers keyed by name.
#[derive(Clone, Default)]
pub struct HookRegistry {
    handlers: HashMap<String, Arc<dyn HookHandler>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.names())
            .finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `metrics` and `audit` handlers.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.handlers.insert(METRICS_HOOK.to_string(), Arc::new(MetricsHook));
        registry.handlers.insert(AUDIT_HOOK.to_string(), Arc::new(AuditHook));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn HookHandler>) -> Result<(), HubError> {
        let name = handler.name().to_string();
        if self.handlers.contains_key(&name) {
            return Err(HubError::RegistrationConflict {
                kind: RegistryKind::Hook,
                name,
            });
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn HookHandler>> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Sorted hook names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run every configured hook of `ctx` for `stage`. Returns the names
    /// that have no handler.
    pub fn run_stage(
        &self,
        stage: HookStage,
        ctx: &mut DispatchContext,
        response: Option<&ResponseEnvelope>,
    ) -> Vec<String> {
        let mut skipped = Vec::new();
        let names = ctx.hooks.clone();
        for name in names {
            match self.handlers.get(&name) {
                Some(handler) => handler.run(stage, ctx, response),
                None => skipped.push(name),
            }
        }
        skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
    }

    impl HookHandler for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn run(&self, _stage: HookStage, _ctx: &mut DispatchContext, _response: Option<&ResponseEnvelope>) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ctx(hooks: &[&str]) -> DispatchContext {
        DispatchContext {
            operation: "casefile.create".into(),
            hooks: hooks.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_builtin_names() {
        assert_eq!(HookRegistry::with_builtin().names(), vec!["audit", "metrics"]);
    }

    #[test]
    fn test_duplicate_hook_rejected() {
        let mut registry = HookRegistry::with_builtin();
        let err = registry.register(Arc::new(MetricsHook)).unwrap_err();
        assert!(matches!(err, HubError::RegistrationConflict { kind: RegistryKind::Hook, .. }));
    }

    #[test]
    fn test_run_stage_reports_unknown_hooks() {
        let registry = HookRegistry::with_builtin();
        let mut ctx = ctx(&["metrics", "bogus"]);
        let skipped = registry.run_stage(HookStage::Pre, &mut ctx, None);
        assert_eq!(skipped, vec!["bogus"]);
        assert_eq!(ctx.hook_events.len(), 1);
    }

    #[test]
    fn test_custom_handler_called_per_stage() {
        let counting = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let mut registry = HookRegistry::new();
        registry.register(counting.clone()).unwrap();

        let mut ctx = ctx(&["counting"]);
        let response = ResponseEnvelope::completed("r1", json!({}));
        registry.run_stage(HookStage::Pre, &mut ctx, None);
        registry.run_stage(HookStage::Post, &mut ctx, Some(&response));
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }
}
