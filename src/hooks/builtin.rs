//! Built-in `metrics` and `audit` hooks.

use chrono::Utc;

use super::{AuditEntry, HookEvent, HookHandler, HookStage};
use crate::contract::ResponseEnvelope;
use crate::orchestrator::DispatchContext;

pub const METRICS_HOOK: &str = "metrics";
pub const AUDIT_HOOK: &str = "audit";

fn event(hook: &str, stage: HookStage, ctx: &DispatchContext, response: Option<&ResponseEnvelope>) -> HookEvent {
    HookEvent {
        hook: hook.to_string(),
        stage,
        operation: ctx.operation.clone(),
        timestamp: Utc::now(),
        response_status: response.map(|r| r.status),
    }
}

/// Appends one timestamped event per stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsHook;

impl HookHandler for MetricsHook {
    fn name(&self) -> &str {
        METRICS_HOOK
    }

    fn run(&self, stage: HookStage, ctx: &mut DispatchContext, response: Option<&ResponseEnvelope>) {
        let event = event(METRICS_HOOK, stage, ctx, response);
        ctx.hook_events.push(event);
    }
}

/// Appends to the shared event log and to the separate audit log.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditHook;

impl HookHandler for AuditHook {
    fn name(&self) -> &str {
        AUDIT_HOOK
    }

    fn run(&self, stage: HookStage, ctx: &mut DispatchContext, response: Option<&ResponseEnvelope>) {
        let event = event(AUDIT_HOOK, stage, ctx, response);
        let entry = AuditEntry {
            operation: ctx.operation.clone(),
            user_id: ctx.user_id.clone(),
            session_id: ctx.session_id.clone(),
            stage,
            status: event.response_status,
            timestamp: event.timestamp,
        };
        if stage == HookStage::Post {
            log::info!(
                "audit: {} by {:?} -> {:?}",
                ctx.operation,
                ctx.user_id,
                entry.status
            );
        }
        ctx.hook_events.push(event);
        ctx.audit_log.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::RequestStatus;
    use serde_json::json;

    fn ctx() -> DispatchContext {
        DispatchContext {
            operation: "casefile.create".into(),
            user_id: Some("u1".into()),
            session_id: Some("ts_1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_metrics_records_status_on_post_only() {
        let mut ctx = ctx();
        let response = ResponseEnvelope::completed("r1", json!({}));
        MetricsHook.run(HookStage::Pre, &mut ctx, None);
        MetricsHook.run(HookStage::Post, &mut ctx, Some(&response));

        assert_eq!(ctx.hook_events.len(), 2);
        assert_eq!(ctx.hook_events[0].response_status, None);
        assert_eq!(ctx.hook_events[1].response_status, Some(RequestStatus::Completed));
        assert!(ctx.audit_log.is_empty());
    }

    #[test]
    fn test_audit_writes_both_logs() {
        let mut ctx = ctx();
        let response = ResponseEnvelope::completed("r1", json!({}));
        AuditHook.run(HookStage::Pre, &mut ctx, None);
        AuditHook.run(HookStage::Post, &mut ctx, Some(&response));

        assert_eq!(ctx.hook_events.len(), 2);
        assert_eq!(ctx.audit_log.len(), 2);
        let post = &ctx.audit_log[1];
        assert_eq!(post.user_id.as_deref(), Some("u1"));
        assert_eq!(post.session_id.as_deref(), Some("ts_1"));
        assert_eq!(post.status, Some(RequestStatus::Completed));
    }
}
