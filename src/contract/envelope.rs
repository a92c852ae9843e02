//! Request and response envelopes.
//!
//! Envelopes are created per call and discarded once the response is
//! returned. The payload is generic so handlers can work with typed models
//! while the wire format stays `serde_json::Value`.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ValidationError;

/// Metadata key carrying the casefile a request is scoped to.
pub const CASEFILE_ID_KEY: &str = "casefile_id";
/// Metadata key linking a sub-request to the request that spawned it.
pub const PARENT_REQUEST_KEY: &str = "parent_request_id";

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Caller-supplied policy selection hints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyHints {
    /// Policy pattern name to apply instead of the operation default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Inbound request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope<P = Value> {
    #[serde(default = "new_request_id")]
    pub request_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub operation: String,
    pub payload: P,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub context_requirements: Vec<String>,
    #[serde(default)]
    pub hooks: Vec<String>,
    #[serde(default)]
    pub policy_hints: PolicyHints,
    #[serde(default)]
    pub route_directives: Map<String, Value>,
}

impl<P> RequestEnvelope<P> {
    pub fn new(operation: impl Into<String>, payload: P) -> Self {
        Self {
            request_id: new_request_id(),
            session_id: None,
            user_id: None,
            operation: operation.into(),
            payload,
            metadata: Map::new(),
            context_requirements: Vec::new(),
            hooks: Vec::new(),
            policy_hints: PolicyHints::default(),
            route_directives: Map::new(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_hooks<I, S>(mut self, hooks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hooks = hooks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context<I, S>(mut self, requirements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context_requirements = requirements.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_policy(mut self, pattern: impl Into<String>) -> Self {
        self.policy_hints.pattern = Some(pattern.into());
        self
    }

    /// Casefile id from metadata, if the caller scoped the request.
    pub fn metadata_casefile_id(&self) -> Option<&str> {
        self.metadata.get(CASEFILE_ID_KEY).and_then(Value::as_str)
    }

    /// Build a sub-request for a composite step.
    ///
    /// The sub-request gets a fresh id, inherits the caller identity and
    /// carries no hooks of its own.
    pub fn sub_request<Q>(&self, operation: impl Into<String>, payload: Q) -> RequestEnvelope<Q> {
        let mut sub = RequestEnvelope::new(operation, payload);
        sub.session_id = self.session_id.clone();
        sub.user_id = self.user_id.clone();
        sub.metadata
            .insert(PARENT_REQUEST_KEY.to_string(), Value::String(self.request_id.clone()));
        sub
    }
}

impl RequestEnvelope<Value> {
    /// Decode the payload into a typed request model.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<RequestEnvelope<T>, ValidationError> {
        let payload = serde_json::from_value::<T>(self.payload.clone())
            .map_err(|e| ValidationError::single("payload", e.to_string()))?;
        Ok(RequestEnvelope {
            request_id: self.request_id.clone(),
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            operation: self.operation.clone(),
            payload,
            metadata: self.metadata.clone(),
            context_requirements: self.context_requirements.clone(),
            hooks: self.hooks.clone(),
            policy_hints: self.policy_hints.clone(),
            route_directives: self.route_directives.clone(),
        })
    }
}

/// Lifecycle status of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure carried by a FAILED response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable kind (`not_found`, `timeout`, ...).
    pub kind: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Outbound response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<P = Value> {
    pub request_id: String,
    pub status: RequestStatus,
    pub payload: P,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ResponseEnvelope<Value> {
    pub fn completed(request_id: impl Into<String>, payload: Value) -> Self {
        Self {
            request_id: request_id.into(),
            status: RequestStatus::Completed,
            payload,
            error: None,
            metadata: Map::new(),
        }
    }

    pub fn failed(request_id: impl Into<String>, error: ErrorInfo) -> Self {
        Self {
            request_id: request_id.into(),
            status: RequestStatus::Failed,
            payload: Value::Null,
            error: Some(error),
            metadata: Map::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RequestStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Title {
        title: String,
    }

    #[test]
    fn test_minimal_request_from_json() {
        let request: RequestEnvelope =
            serde_json::from_value(json!({"operation": "casefile.create", "payload": {"title": "x"}})).unwrap();
        assert_eq!(request.operation, "casefile.create");
        assert!(!request.request_id.is_empty());
        assert!(request.hooks.is_empty());
        assert!(request.policy_hints.pattern.is_none());
    }

    #[test]
    fn test_policy_hints_keep_extra_fields() {
        let hints: PolicyHints = serde_json::from_value(json!({"pattern": "session_observer", "tier": "gold"})).unwrap();
        assert_eq!(hints.pattern.as_deref(), Some("session_observer"));
        assert_eq!(hints.extra.get("tier"), Some(&json!("gold")));
    }

    #[test]
    fn test_decode_typed_payload() {
        let request = RequestEnvelope::new("casefile.create", json!({"title": "Incident"}))
            .with_user("u1")
            .with_metadata(CASEFILE_ID_KEY, json!("cf-1"));
        let typed = request.decode::<Title>().unwrap();
        assert_eq!(typed.payload, Title { title: "Incident".into() });
        assert_eq!(typed.request_id, request.request_id);
        assert_eq!(typed.metadata_casefile_id(), Some("cf-1"));
    }

    #[test]
    fn test_decode_failure_is_validation_error() {
        let request = RequestEnvelope::new("casefile.create", json!({"name": 3}));
        let err = request.decode::<Title>().unwrap_err();
        assert!(err.has_field("payload"));
    }

    #[test]
    fn test_sub_request_inherits_identity_not_hooks() {
        let parent = RequestEnvelope::new("workflow.x", json!({}))
            .with_user("u1")
            .with_session("s1")
            .with_hooks(["metrics"]);
        let sub = parent.sub_request("casefile.create", json!({"title": "t"}));
        assert_ne!(sub.request_id, parent.request_id);
        assert_eq!(sub.user_id.as_deref(), Some("u1"));
        assert!(sub.hooks.is_empty());
        assert_eq!(sub.metadata.get(PARENT_REQUEST_KEY), Some(&json!(parent.request_id)));
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_value(RequestStatus::InProgress).unwrap(), json!("IN_PROGRESS"));
        let response = ResponseEnvelope::failed("r1", ErrorInfo::new("timeout", "slow"));
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["status"], "FAILED");
        assert_eq!(wire["error"]["kind"], "timeout");
    }
}
