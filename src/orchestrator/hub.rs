//! The request hub: routes envelopes through context preparation, hooks and
//! the core operation.
//!
//! Error policy: an unknown operation (`HubError::Protocol`) or a payload
//! that does not decode (`HubError::Validation`) is returned as `Err` before
//! any context fetch, hook or service call. Once the core operation starts,
//! its failures (and deadline expiry) become a `FAILED` response carrying
//! `ErrorInfo { kind, message }`, and post hooks still run.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use super::context::{attach_hook_metadata, prepare_context, SKIPPED_HOOKS_KEY};
use super::handlers::{OperationRoute, OperationTable};
use crate::capabilities::ValidatedParams;
use crate::catalog::{builtin_catalog, check_consistency, ConsistencyReport, SharedCatalog};
use crate::config::HubConfig;
use crate::contract::{ErrorInfo, RequestEnvelope, ResponseEnvelope, CASEFILE_ID_KEY};
use crate::error::HubError;
use crate::hooks::{HookRegistry, HookStage};
use crate::policy::PolicyLoader;
use crate::services::{InMemoryStore, Services};
use crate::tools::{CallerContext, MethodExecutor};

pub struct RequestHub {
    catalog: SharedCatalog,
    operations: OperationTable,
    policies: PolicyLoader,
    hooks: HookRegistry,
    services: Arc<Services>,
    config: HubConfig,
}

impl fmt::Debug for RequestHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHub")
            .field("operations", &self.operations.names())
            .field("policies", &self.policies.names())
            .field("hooks", &self.hooks.names())
            .field("config", &self.config)
            .finish()
    }
}

impl RequestHub {
    /// Hub with the built-in operations, policy patterns and hooks.
    pub fn new(catalog: SharedCatalog, services: Services, config: HubConfig) -> Self {
        Self {
            catalog,
            operations: OperationTable::builtin(),
            policies: PolicyLoader::new(),
            hooks: HookRegistry::with_builtin(),
            services: Arc::new(services),
            config,
        }
    }

    /// Built-in catalog over in-memory services.
    pub fn in_memory(store: Arc<InMemoryStore>, config: HubConfig) -> Result<Self, HubError> {
        let catalog = SharedCatalog::new(builtin_catalog()?.build());
        Ok(Self::new(catalog, Services::in_memory(store), config))
    }

    pub fn with_policies(mut self, policies: PolicyLoader) -> Self {
        self.policies = policies;
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_operations(mut self, operations: OperationTable) -> Self {
        self.operations = operations;
        self
    }

    pub fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Consistency of the current catalog against the operation table.
    pub fn check_consistency(&self) -> ConsistencyReport {
        check_consistency(&self.catalog.snapshot(), &self.operations.names())
    }

    /// Policy for `request`: the request hint, else the operation default,
    /// else the configured default. Unknown names resolve to `default`.
    pub fn select_policy(&self, request: &RequestEnvelope) -> String {
        let route = self.operations.get(&request.operation);
        let requested = request
            .policy_hints
            .pattern
            .as_deref()
            .or_else(|| route.and_then(|r| r.default_policy.as_deref()))
            .unwrap_or(&self.config.default_policy);
        self.policies.resolve(requested).to_string()
    }

    pub async fn dispatch(&self, request: RequestEnvelope) -> Result<ResponseEnvelope, HubError> {
        let route: &OperationRoute = self
            .operations
            .get(&request.operation)
            .ok_or_else(|| HubError::protocol(&request.operation))?;
        let call = route.handler.prepare(&request, &self.services)?;

        let policy = self.select_policy(&request);
        let defaults = self.policies.load(&policy);
        let mut ctx = prepare_context(&request, &policy, &defaults, &self.services).await;
        log::debug!(
            "Dispatching {} ({}) policy={} hooks={:?}",
            request.operation,
            request.request_id,
            policy,
            ctx.hooks
        );

        let skipped = self.hooks.run_stage(HookStage::Pre, &mut ctx, None);
        if self.config.warn_on_unknown_hooks && !skipped.is_empty() {
            for name in &skipped {
                log::warn!("Unknown hook '{}' skipped for {}", name, request.operation);
            }
            ctx.skipped_hooks = skipped;
        }

        let started = Instant::now();
        let outcome = match self.config.operation_timeout() {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result.map_err(|e| ErrorInfo::new(e.kind(), e.to_string())),
                Err(_) => Err(ErrorInfo::new(
                    "timeout",
                    format!("{} exceeded {} ms", request.operation, limit.as_millis()),
                )),
            },
            None => call.await.map_err(|e| ErrorInfo::new(e.kind(), e.to_string())),
        };

        let mut response = match outcome {
            Ok(payload) => ResponseEnvelope::completed(&request.request_id, payload),
            Err(error) => {
                log::warn!(
                    "Operation {} ({}) failed: {}: {}",
                    request.operation,
                    request.request_id,
                    error.kind,
                    error.message
                );
                ResponseEnvelope::failed(&request.request_id, error)
            }
        };

        self.hooks.run_stage(HookStage::Post, &mut ctx, Some(&response));
        attach_hook_metadata(&mut response, &ctx);
        if !ctx.skipped_hooks.is_empty() {
            response
                .metadata
                .entry(SKIPPED_HOOKS_KEY)
                .or_insert_with(|| Value::from(ctx.skipped_hooks.clone()));
        }

        log::debug!(
            "Dispatched {} ({}) -> {} in {} ms, {} hook event(s)",
            request.operation,
            request.request_id,
            response.status,
            started.elapsed().as_millis(),
            ctx.hook_events.len()
        );
        Ok(response)
    }
}

/// Bound tools execute through the operation routed to their method.
#[async_trait]
impl MethodExecutor for RequestHub {
    async fn execute_method(
        &self,
        method: &str,
        params: ValidatedParams,
        caller: &CallerContext,
    ) -> Result<Value, HubError> {
        let operation = self
            .operations
            .operation_for_method(method)
            .ok_or_else(|| HubError::protocol(method))?;

        let mut request = RequestEnvelope::new(operation, params.into_value());
        request.user_id = caller.user_id.clone();
        request.session_id = caller.session_id.clone();
        if let Some(casefile_id) = &caller.casefile_id {
            request
                .metadata
                .insert(CASEFILE_ID_KEY.to_string(), Value::String(casefile_id.clone()));
        }

        let response = self.dispatch(request).await?;
        if response.is_completed() {
            return Ok(response.payload);
        }
        let error = response
            .error
            .unwrap_or_else(|| ErrorInfo::new("execution_error", format!("{} failed", operation)));
        Err(HubError::execution(error.kind, error.message))
    }
}
