//! # Orchestration hub
//!
//! Routes a [`RequestEnvelope`](crate::contract::RequestEnvelope) to its
//! operation and wraps the call in context preparation and hooks.
//!
//! ## Architecture
//!
//! ```text
//! RequestHub.dispatch(request)
//!   ├─ OperationTable.get(operation)        → HubError::Protocol
//!   ├─ handler.prepare(request)             → HubError::Validation (lazy call, nothing ran)
//!   ├─ select_policy: hint → operation default → config default
//!   ├─ prepare_context                      session / casefile fetch, soft-fail
//!   ├─ hooks: pre
//!   ├─ core operation (optional deadline)   → COMPLETED | FAILED{kind, message}
//!   ├─ hooks: post (sees the response)
//!   └─ attach_hook_metadata                 hook_events, audit_log, skipped_hooks
//! ```
//!
//! Composite operations ([`workflow`]) call the services through
//! sub-requests in sequence; only the outer dispatch runs hooks.

pub mod context;
pub mod handlers;
pub mod hub;
pub mod workflow;

pub use context::{
    attach_hook_metadata, ordered_dedupe, prepare_context, resolve_casefile_id, DispatchContext,
    AUDIT_LOG_KEY, CASEFILE_CONTEXT, HOOK_EVENTS_KEY, SESSION_CONTEXT, SKIPPED_HOOKS_KEY,
};
pub use handlers::{typed, OperationHandler, OperationRoute, OperationTable, PendingCall, TypedHandler};
pub use hub::RequestHub;
