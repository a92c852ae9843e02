//! # Service collaborators
//!
//! The hub consumes these interfaces and never their implementations:
//!
//! ```text
//! SessionRepository.get(session_id)    -> Option<ToolSession>
//! CasefileRepository.get(casefile_id)  -> Option<Casefile>
//! CasefileService.create / get / add_session
//! SessionService.create
//! CommunicationService.process_chat
//! ```
//!
//! [`memory`] provides dashmap-backed implementations of all five used by
//! the `hub` binary and the tests.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contract::{
    AddSessionToCasefileRequest, AddSessionToCasefileResponse, ChatRequest, ChatResponse,
    CreateCasefileRequest, CreateCasefileResponse, CreateSessionRequest, CreateSessionResponse,
    GetCasefileRequest, GetCasefileResponse, RequestEnvelope,
};

pub use memory::InMemoryStore;

// ---------------------------------------------------------------------------
// Domain records
// ---------------------------------------------------------------------------

/// A casefile groups related tool sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Casefile {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub session_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A tool session: one conversation, optionally scoped to a casefile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ToolSession {
    pub id: String,
    #[serde(default)]
    pub casefile_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure reported by a collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable machine-readable kind, copied into `ErrorInfo::kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Invalid(_) => "invalid_request",
            Self::Unavailable(_) => "unavailable",
            Self::Internal(_) => "internal",
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<ToolSession>, ServiceError>;
}

#[async_trait]
pub trait CasefileRepository: Send + Sync {
    async fn get(&self, casefile_id: &str) -> Result<Option<Casefile>, ServiceError>;
}

#[async_trait]
pub trait CasefileService: Send + Sync {
    async fn create(
        &self,
        request: &RequestEnvelope<CreateCasefileRequest>,
    ) -> Result<CreateCasefileResponse, ServiceError>;

    async fn get(&self, request: &RequestEnvelope<GetCasefileRequest>) -> Result<GetCasefileResponse, ServiceError>;

    async fn add_session(
        &self,
        request: &RequestEnvelope<AddSessionToCasefileRequest>,
    ) -> Result<AddSessionToCasefileResponse, ServiceError>;
}

#[async_trait]
pub trait SessionService: Send + Sync {
    async fn create(
        &self,
        request: &RequestEnvelope<CreateSessionRequest>,
    ) -> Result<CreateSessionResponse, ServiceError>;
}

#[async_trait]
pub trait CommunicationService: Send + Sync {
    async fn process_chat(&self, request: &RequestEnvelope<ChatRequest>) -> Result<ChatResponse, ServiceError>;
}

/// The collaborator set a hub is constructed with.
#[derive(Clone)]
pub struct Services {
    pub sessions: Arc<dyn SessionRepository>,
    pub casefiles: Arc<dyn CasefileRepository>,
    pub casefile_service: Arc<dyn CasefileService>,
    pub session_service: Arc<dyn SessionService>,
    pub communication: Arc<dyn CommunicationService>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

impl Services {
    /// Every collaborator backed by the same in-memory store.
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            sessions: store.clone(),
            casefiles: store.clone(),
            casefile_service: store.clone(),
            session_service: store.clone(),
            communication: store,
        }
    }
}
