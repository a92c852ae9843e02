//! Per-dispatch context: effective requirements and hooks, fetched
//! auxiliary records, and the events recorded by hooks.
//!
//! A context is owned by the dispatching task and never shared.

use serde_json::{Map, Value};

use crate::contract::{RequestEnvelope, ResponseEnvelope, CASEFILE_ID_KEY};
use crate::hooks::{AuditEntry, HookEvent};
use crate::policy::PolicyDefaults;
use crate::services::{Casefile, Services, ToolSession};

/// Context requirement that fetches the request's session.
pub const SESSION_CONTEXT: &str = "session";
/// Context requirement that fetches the request's casefile.
pub const CASEFILE_CONTEXT: &str = "casefile";

pub const HOOK_EVENTS_KEY: &str = "hook_events";
pub const AUDIT_LOG_KEY: &str = "audit_log";
pub const SKIPPED_HOOKS_KEY: &str = "skipped_hooks";

#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    pub request_id: String,
    pub operation: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    /// Policy pattern the defaults came from.
    pub policy: String,
    pub context_requirements: Vec<String>,
    pub hooks: Vec<String>,
    pub session: Option<ToolSession>,
    pub casefile: Option<Casefile>,
    pub hook_events: Vec<HookEvent>,
    pub audit_log: Vec<AuditEntry>,
    pub skipped_hooks: Vec<String>,
}

impl DispatchContext {
    /// Context with effective requirements and hooks resolved, nothing fetched.
    pub fn resolve(request: &RequestEnvelope, policy: &str, defaults: &PolicyDefaults) -> Self {
        Self {
            request_id: request.request_id.clone(),
            operation: request.operation.clone(),
            user_id: request.user_id.clone(),
            session_id: request.session_id.clone(),
            policy: policy.to_string(),
            context_requirements: ordered_dedupe(
                defaults
                    .context_requirements
                    .iter()
                    .chain(request.context_requirements.iter()),
            ),
            hooks: ordered_dedupe(defaults.hooks.iter().chain(request.hooks.iter())),
            ..Default::default()
        }
    }

    pub fn requires(&self, requirement: &str) -> bool {
        self.context_requirements.iter().any(|r| r == requirement)
    }
}

/// Keep the first occurrence of every name, preserving order.
pub fn ordered_dedupe<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut out: Vec<String> = Vec::new();
    for name in names {
        if !out.contains(name) {
            out.push(name.clone());
        }
    }
    out
}

/// Casefile id from `metadata["casefile_id"]`, else a `casefile_id` payload field.
pub fn resolve_casefile_id(request: &RequestEnvelope) -> Option<String> {
    request
        .metadata_casefile_id()
        .or_else(|| request.payload.get(CASEFILE_ID_KEY).and_then(Value::as_str))
        .map(str::to_string)
}

/// Resolve the effective context and fetch what it requires.
///
/// Fetches are soft-fail: a miss or a repository error leaves the slot empty.
pub async fn prepare_context(
    request: &RequestEnvelope,
    policy: &str,
    defaults: &PolicyDefaults,
    services: &Services,
) -> DispatchContext {
    let mut ctx = DispatchContext::resolve(request, policy, defaults);

    if ctx.requires(SESSION_CONTEXT) {
        if let Some(session_id) = request.session_id.as_deref() {
            ctx.session = match services.sessions.get(session_id).await {
                Ok(found) => found,
                Err(e) => {
                    log::warn!("Session fetch failed for {}: {}", session_id, e);
                    None
                }
            };
            if ctx.session.is_none() {
                log::debug!("Session {} not available for {}", session_id, ctx.request_id);
            }
        }
    }

    if ctx.requires(CASEFILE_CONTEXT) {
        if let Some(casefile_id) = resolve_casefile_id(request) {
            ctx.casefile = match services.casefiles.get(&casefile_id).await {
                Ok(found) => found,
                Err(e) => {
                    log::warn!("Casefile fetch failed for {}: {}", casefile_id, e);
                    None
                }
            };
        }
    }

    ctx
}

/// Merge recorded events into the response metadata without overwriting
/// keys the handler already set.
pub fn attach_hook_metadata(response: &mut ResponseEnvelope, ctx: &DispatchContext) {
    let metadata: &mut Map<String, Value> = &mut response.metadata;

    metadata
        .entry(HOOK_EVENTS_KEY)
        .or_insert_with(|| serde_json::to_value(&ctx.hook_events).unwrap_or(Value::Array(Vec::new())));

    if !ctx.audit_log.is_empty() {
        metadata
            .entry(AUDIT_LOG_KEY)
            .or_insert_with(|| serde_json::to_value(&ctx.audit_log).unwrap_or(Value::Array(Vec::new())));
    }
}
