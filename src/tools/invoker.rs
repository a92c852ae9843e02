//! Tool invocation wrapper.
//!
//! ```text
//! invoke(name, raw, options)
//!   ├─ lookup          → ToolError::NotFound
//!   ├─ enabled         → ToolError::Disabled
//!   ├─ auth / roles / permissions (tool + bound method)
//!   ├─ validate(raw)   → ToolError::Validation     (nothing downstream runs)
//!   ├─ requires_casefile
//!   ├─ dry_run         → ToolResult { status: dry_run }
//!   ├─ rate limit      → ToolError::RateLimited
//!   └─ execute (timeout, retries) → ToolResult { status: success | error }
//! ```
//!
//! Rejections before execution are `Err(ToolError)`. Once execution starts,
//! failures are normalized into a `ToolResult` with `status: error`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::rate_limit::RateLimiter;
use super::tool_def::ToolDescriptor;
use crate::capabilities::{MethodDescriptor, ValidatedParams};
use crate::catalog::SharedCatalog;
use crate::contract::CASEFILE_ID_KEY;
use crate::error::{HubError, ValidationError};

/// Executes a registered method by name.
///
/// Implemented by the hub through its operation table, so a bound tool never
/// resolves its implementation by reflection.
#[async_trait]
pub trait MethodExecutor: Send + Sync {
    async fn execute_method(
        &self,
        method: &str,
        params: ValidatedParams,
        caller: &CallerContext,
    ) -> Result<Value, HubError>;
}

/// Who is calling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub casefile_id: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub authenticated: bool,
}

impl CallerContext {
    /// An authenticated user with the given permissions.
    pub fn user<I, S>(user_id: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id: Some(user_id.into()),
            permissions: permissions.into_iter().map(Into::into).collect(),
            authenticated: true,
            ..Default::default()
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_casefile(mut self, casefile_id: impl Into<String>) -> Self {
        self.casefile_id = Some(casefile_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    pub dry_run: bool,
    /// Caller deadline. Can tighten the tool's own timeout, never extend it.
    pub timeout_seconds: Option<u64>,
    pub caller: CallerContext,
}

impl InvokeOptions {
    pub fn for_caller(caller: CallerContext) -> Self {
        Self {
            caller,
            ..Default::default()
        }
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    DryRun,
    Error,
}

/// Normalized outcome of an invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: String,
    pub status: ToolStatus,
    pub parameters: ValidatedParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub duration_ms: u64,
    /// Executions attempted (0 for a dry run).
    pub attempts: u32,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

/// Rejection before anything downstream runs.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool '{tool}' is disabled: {reason}")]
    Disabled { tool: String, reason: String },

    #[error("Tool '{0}' requires an authenticated caller")]
    Unauthenticated(String),

    #[error("Permission denied for tool '{tool}': {reason}")]
    PermissionDenied { tool: String, reason: String },

    #[error("Rate limit exceeded for tool '{tool}', retry after {retry_after_ms} ms")]
    RateLimited { tool: String, retry_after_ms: u64 },

    #[error("Tool '{0}' requires a casefile")]
    CasefileRequired(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Invokes tools from the current catalog snapshot.
pub struct ToolInvoker {
    catalog: SharedCatalog,
    executor: Option<Arc<dyn MethodExecutor>>,
    limiter: RateLimiter,
}

impl std::fmt::Debug for ToolInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolInvoker")
            .field("has_executor", &self.executor.is_some())
            .finish()
    }
}

impl ToolInvoker {
    pub fn new(catalog: SharedCatalog) -> Self {
        Self {
            catalog,
            executor: None,
            limiter: RateLimiter::new(),
        }
    }

    /// Executor for tools bound to a method without their own implementation.
    pub fn with_executor(mut self, executor: Arc<dyn MethodExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub async fn invoke(&self, name: &str, raw: Value, options: InvokeOptions) -> Result<ToolResult, ToolError> {
        let catalog = self.catalog.snapshot();
        let tool = catalog
            .tool(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        let method = tool.method_name.as_deref().and_then(|m| catalog.method(m));
        let rules = &tool.business_rules;
        let caller = &options.caller;

        if !rules.enabled {
            return Err(ToolError::Disabled {
                tool: name.to_string(),
                reason: rules
                    .deprecation_message
                    .clone()
                    .unwrap_or_else(|| "disabled by business rules".to_string()),
            });
        }

        let mut warnings = Vec::new();
        if rules.deprecated {
            let message = rules
                .deprecation_message
                .clone()
                .unwrap_or_else(|| format!("Tool '{}' is deprecated", name));
            log::warn!("{}", message);
            warnings.push(message);
        }
        if let Some(deprecation) = method.and_then(|m| m.business_rules.deprecation.as_ref()) {
            warnings.push(format!(
                "Method '{}' is deprecated since {}",
                tool.method_name.as_deref().unwrap_or_default(),
                deprecation.since
            ));
        }

        self.authorize(tool, method, caller)?;

        let params = tool.validate(&raw)?;

        if rules.requires_casefile
            && params.get_str(CASEFILE_ID_KEY).is_none()
            && caller.casefile_id.is_none()
        {
            return Err(ToolError::CasefileRequired(name.to_string()));
        }

        if options.dry_run {
            log::debug!("Dry run of tool {}", name);
            return Ok(ToolResult {
                tool: name.to_string(),
                status: ToolStatus::DryRun,
                parameters: params,
                result: None,
                error_type: None,
                error_message: None,
                duration_ms: 0,
                attempts: 0,
                warnings,
            });
        }

        self.limiter
            .try_acquire(name, rules.rate_limit_per_minute, rules.rate_limit_per_hour)
            .map_err(|retry_after_ms| ToolError::RateLimited {
                tool: name.to_string(),
                retry_after_ms,
            })?;

        let timeout = effective_timeout(options.timeout_seconds, rules.timeout_seconds);
        // Standalone tools and idempotent methods may be retried.
        let retryable = method.map_or(tool.implementation.is_some() || !tool.is_bound(), |m| {
            m.business_rules.idempotent
        });
        let max_attempts = if retryable { rules.max_retries + 1 } else { 1 };

        let started = Instant::now();
        let mut attempts = 0;
        let outcome = loop {
            attempts += 1;
            match self.execute_once(tool, params.clone(), caller, timeout).await {
                Ok(value) => break Ok(value),
                Err(err) if attempts < max_attempts && matches!(err, HubError::Execution { .. }) => {
                    log::warn!("Tool {} attempt {} failed, retrying: {}", name, attempts, err);
                }
                Err(err) => break Err(err),
            }
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut result = ToolResult {
            tool: name.to_string(),
            status: ToolStatus::Success,
            parameters: params,
            result: None,
            error_type: None,
            error_message: None,
            duration_ms,
            attempts,
            warnings,
        };
        match outcome {
            Ok(value) => {
                log::debug!("Tool {} succeeded in {} ms", name, duration_ms);
                result.result = Some(value);
            }
            Err(err) => {
                log::warn!("Tool {} failed after {} attempt(s): {}", name, attempts, err);
                result.status = ToolStatus::Error;
                result.error_type = Some(err.kind().to_string());
                result.error_message = Some(err.to_string());
            }
        }
        Ok(result)
    }

    fn authorize(
        &self,
        tool: &ToolDescriptor,
        method: Option<&MethodDescriptor>,
        caller: &CallerContext,
    ) -> Result<(), ToolError> {
        let rules = &tool.business_rules;
        let name = tool.name();

        if rules.requires_auth && !caller.authenticated {
            return Err(ToolError::Unauthenticated(name.to_string()));
        }

        if !rules.allowed_roles.is_empty() && !caller.roles.iter().any(|r| rules.allowed_roles.contains(r)) {
            return Err(ToolError::PermissionDenied {
                tool: name.to_string(),
                reason: format!("requires one of roles [{}]", rules.allowed_roles.join(", ")),
            });
        }

        let required = rules
            .required_permissions
            .iter()
            .chain(method.into_iter().flat_map(|m| m.business_rules.required_permissions.iter()));
        let missing: Vec<&str> = required
            .filter(|p| !caller.permissions.contains(*p))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(ToolError::PermissionDenied {
                tool: name.to_string(),
                reason: format!("missing permissions [{}]", missing.join(", ")),
            });
        }
        Ok(())
    }

    async fn execute_once(
        &self,
        tool: &ToolDescriptor,
        params: ValidatedParams,
        caller: &CallerContext,
        timeout: Option<Duration>,
    ) -> Result<Value, HubError> {
        let call = async {
            if let Some(implementation) = &tool.implementation {
                return implementation(params).await;
            }
            match (tool.method_name.as_deref(), &self.executor) {
                (Some(method), Some(executor)) => executor.execute_method(method, params, caller).await,
                (Some(method), None) => Err(HubError::execution(
                    "unresolved_implementation",
                    format!("no executor available for method '{}'", method),
                )),
                (None, _) => Err(HubError::execution(
                    "unresolved_implementation",
                    format!("tool '{}' has neither an implementation nor a method", tool.name()),
                )),
            }
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                Err(HubError::execution(
                    "timeout",
                    format!("tool '{}' exceeded {} s", tool.name(), limit.as_secs()),
                ))
            }),
            None => call.await,
        }
    }
}

/// The stricter of the caller's and the tool's deadline.
fn effective_timeout(requested: Option<u64>, declared: Option<u64>) -> Option<Duration> {
    match (requested, declared) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
    .map(Duration::from_secs)
}
