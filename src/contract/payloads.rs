//! Typed request/response models of every hub operation.
//!
//! Request models derive `JsonSchema`; method parameter specs are derived
//! from them once at registration.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::services::{Casefile, ChatMessage};

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Casefile
// ---------------------------------------------------------------------------

/// Create a casefile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreateCasefileRequest {
    /// Human-readable title.
    #[schemars(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreateCasefileResponse {
    pub casefile_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Read a casefile by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GetCasefileRequest {
    pub casefile_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GetCasefileResponse {
    pub casefile: Casefile,
}

/// Link an existing session to a casefile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AddSessionToCasefileRequest {
    pub casefile_id: String,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AddSessionToCasefileResponse {
    pub casefile_id: String,
    pub session_id: String,
    /// Sessions linked after this call.
    pub session_count: usize,
}

// ---------------------------------------------------------------------------
// Tool sessions
// ---------------------------------------------------------------------------

/// Start a tool session. The owning casefile, if any, travels in request
/// metadata under `casefile_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub casefile_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Process one chat message within the request's session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChatRequest {
    #[schemars(length(min = 1))]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: ChatMessage,
    /// Messages in the session after this exchange.
    pub message_count: usize,
}

// ---------------------------------------------------------------------------
// Composite workflow
// ---------------------------------------------------------------------------

/// Create a casefile and, optionally, a tool session linked to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreateCasefileWithSessionRequest {
    #[schemars(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Start a dependent session right away.
    #[serde(default = "default_true")]
    pub auto_start_session: bool,
    #[serde(default)]
    pub session_title: Option<String>,
}

/// Association between a primary resource and a dependent one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceLink {
    pub primary_id: String,
    pub dependent_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreateCasefileWithSessionResponse {
    pub casefile_id: String,
    pub session_id: Option<String>,
    pub links: Vec<ResourceLink>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{parameters_of, ParameterType};
    use serde_json::json;

    #[test]
    fn test_create_casefile_parameters() {
        let params = parameters_of::<CreateCasefileRequest>();
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["title", "description", "tags"]);
        assert!(params[0].required);
        assert_eq!(params[0].max_length, Some(200));
        assert!(!params[1].required);
        assert_eq!(params[2].param_type, ParameterType::Array);
    }

    #[test]
    fn test_composite_auto_start_defaults_true() {
        let request: CreateCasefileWithSessionRequest =
            serde_json::from_value(json!({"title": "Outage"})).unwrap();
        assert!(request.auto_start_session);
        assert!(request.session_title.is_none());
    }

    #[test]
    fn test_session_request_accepts_empty_object() {
        let request: CreateSessionRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(request, CreateSessionRequest::default());
    }
}
