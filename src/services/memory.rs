//! In-memory collaborators backed by `DashMap`.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{
    Casefile, CasefileRepository, CasefileService, ChatMessage, ChatRole, CommunicationService,
    ServiceError, SessionRepository, SessionService, ToolSession,
};
use crate::contract::{
    AddSessionToCasefileRequest, AddSessionToCasefileResponse, ChatRequest, ChatResponse,
    CreateCasefileRequest, CreateCasefileResponse, CreateSessionRequest, CreateSessionResponse,
    GetCasefileRequest, GetCasefileResponse, RequestEnvelope,
};

/// Casefiles and sessions held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    casefiles: DashMap<String, Casefile>,
    sessions: DashMap<String, ToolSession>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn casefile_count(&self) -> usize {
        self.casefiles.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn casefile(&self, id: &str) -> Option<Casefile> {
        self.casefiles.get(id).map(|c| c.clone())
    }

    pub fn session(&self, id: &str) -> Option<ToolSession> {
        self.sessions.get(id).map(|s| s.clone())
    }
}

#[async_trait]
impl SessionRepository for InMemoryStore {
    async fn get(&self, session_id: &str) -> Result<Option<ToolSession>, ServiceError> {
        Ok(self.session(session_id))
    }
}

#[async_trait]
impl CasefileRepository for InMemoryStore {
    async fn get(&self, casefile_id: &str) -> Result<Option<Casefile>, ServiceError> {
        Ok(self.casefile(casefile_id))
    }
}

#[async_trait]
impl CasefileService for InMemoryStore {
    async fn create(
        &self,
        request: &RequestEnvelope<CreateCasefileRequest>,
    ) -> Result<CreateCasefileResponse, ServiceError> {
        let title = request.payload.title.trim();
        if title.is_empty() {
            return Err(ServiceError::Invalid("title must not be blank".into()));
        }

        let now = Utc::now();
        let casefile = Casefile {
            id: format!("cf_{}", Uuid::new_v4().simple()),
            title: title.to_string(),
            description: request.payload.description.clone(),
            tags: request.payload.tags.clone(),
            owner: request.user_id.clone(),
            session_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        log::debug!("Created casefile {} for {:?}", casefile.id, casefile.owner);

        let response = CreateCasefileResponse {
            casefile_id: casefile.id.clone(),
            title: casefile.title.clone(),
            created_at: now,
        };
        self.casefiles.insert(casefile.id.clone(), casefile);
        Ok(response)
    }

    async fn get(&self, request: &RequestEnvelope<GetCasefileRequest>) -> Result<GetCasefileResponse, ServiceError> {
        let id = &request.payload.casefile_id;
        self.casefile(id)
            .map(|casefile| GetCasefileResponse { casefile })
            .ok_or_else(|| ServiceError::not_found("Casefile", id))
    }

    async fn add_session(
        &self,
        request: &RequestEnvelope<AddSessionToCasefileRequest>,
    ) -> Result<AddSessionToCasefileResponse, ServiceError> {
        let AddSessionToCasefileRequest {
            casefile_id,
            session_id,
        } = &request.payload;

        if !self.sessions.contains_key(session_id) {
            return Err(ServiceError::not_found("ToolSession", session_id));
        }

        let session_count = {
            let mut casefile = self
                .casefiles
                .get_mut(casefile_id)
                .ok_or_else(|| ServiceError::not_found("Casefile", casefile_id))?;
            if !casefile.session_ids.contains(session_id) {
                casefile.session_ids.push(session_id.clone());
                casefile.updated_at = Utc::now();
            }
            casefile.session_ids.len()
        };

        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.casefile_id = Some(casefile_id.clone());
        }

        Ok(AddSessionToCasefileResponse {
            casefile_id: casefile_id.clone(),
            session_id: session_id.clone(),
            session_count,
        })
    }
}

#[async_trait]
impl SessionService for InMemoryStore {
    async fn create(
        &self,
        request: &RequestEnvelope<CreateSessionRequest>,
    ) -> Result<CreateSessionResponse, ServiceError> {
        let casefile_id = request.metadata_casefile_id().map(str::to_string);
        if let Some(id) = &casefile_id {
            if !self.casefiles.contains_key(id) {
                return Err(ServiceError::not_found("Casefile", id));
            }
        }

        let now = Utc::now();
        let session = ToolSession {
            id: format!("ts_{}", Uuid::new_v4().simple()),
            casefile_id: casefile_id.clone(),
            user_id: request.user_id.clone(),
            title: request.payload.title.clone(),
            messages: Vec::new(),
            created_at: now,
        };
        let session_id = session.id.clone();
        self.sessions.insert(session_id.clone(), session);

        Ok(CreateSessionResponse {
            session_id,
            casefile_id,
            created_at: now,
        })
    }
}

#[async_trait]
impl CommunicationService for InMemoryStore {
    async fn process_chat(&self, request: &RequestEnvelope<ChatRequest>) -> Result<ChatResponse, ServiceError> {
        let session_id = request
            .session_id
            .as_deref()
            .ok_or_else(|| ServiceError::Invalid("chat requires a session_id".into()))?;

        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| ServiceError::not_found("ToolSession", session_id))?;

        let now = Utc::now();
        session.messages.push(ChatMessage {
            role: ChatRole::User,
            content: request.payload.message.clone(),
            timestamp: now,
        });
        let reply = ChatMessage {
            role: ChatRole::Assistant,
            content: format!("Received: {}", request.payload.message),
            timestamp: now,
        };
        session.messages.push(reply.clone());

        Ok(ChatResponse {
            session_id: session_id.to_string(),
            reply,
            message_count: session.messages.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::CASEFILE_ID_KEY;
    use serde_json::json;

    fn create_request(title: &str) -> RequestEnvelope<CreateCasefileRequest> {
        RequestEnvelope::new(
            "casefile.create",
            CreateCasefileRequest {
                title: title.into(),
                description: None,
                tags: vec![],
            },
        )
        .with_user("u1")
    }

    #[tokio::test]
    async fn test_create_and_get_casefile() {
        let store = InMemoryStore::new();
        let created = CasefileService::create(&store, &create_request("Outage")).await.unwrap();

        let fetched = CasefileRepository::get(&store, &created.casefile_id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Outage");
        assert_eq!(fetched.owner.as_deref(), Some("u1"));

        let missing = CasefileRepository::get(&store, "cf_missing").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_blank_title_rejected() {
        let store = InMemoryStore::new();
        let err = CasefileService::create(&store, &create_request("   ")).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
        assert_eq!(store.casefile_count(), 0);
    }

    #[tokio::test]
    async fn test_session_scoped_to_casefile_and_linked_once() {
        let store = InMemoryStore::new();
        let cf = CasefileService::create(&store, &create_request("Outage")).await.unwrap();

        let session_req = RequestEnvelope::new("tool_session.create", CreateSessionRequest::default())
            .with_metadata(CASEFILE_ID_KEY, json!(cf.casefile_id));
        let session = SessionService::create(&store, &session_req).await.unwrap();
        assert_eq!(session.casefile_id.as_deref(), Some(cf.casefile_id.as_str()));

        let link = RequestEnvelope::new(
            "casefile.add_session",
            AddSessionToCasefileRequest {
                casefile_id: cf.casefile_id.clone(),
                session_id: session.session_id.clone(),
            },
        );
        assert_eq!(store.add_session(&link).await.unwrap().session_count, 1);
        assert_eq!(store.add_session(&link).await.unwrap().session_count, 1);
    }

    #[tokio::test]
    async fn test_session_for_unknown_casefile_fails() {
        let store = InMemoryStore::new();
        let req = RequestEnvelope::new("tool_session.create", CreateSessionRequest::default())
            .with_metadata(CASEFILE_ID_KEY, json!("cf_nope"));
        let err = SessionService::create(&store, &req).await.unwrap_err();
        assert_eq!(err, ServiceError::not_found("Casefile", "cf_nope"));
    }

    #[tokio::test]
    async fn test_chat_appends_exchange() {
        let store = InMemoryStore::new();
        let session = SessionService::create(
            &store,
            &RequestEnvelope::new("tool_session.create", CreateSessionRequest::default()),
        )
        .await
        .unwrap();

        let chat = RequestEnvelope::new("chat.process", ChatRequest { message: "hello".into() })
            .with_session(&session.session_id);
        let response = store.process_chat(&chat).await.unwrap();
        assert_eq!(response.message_count, 2);
        assert_eq!(response.reply.content, "Received: hello");

        let no_session = RequestEnvelope::new("chat.process", ChatRequest { message: "hi".into() });
        assert_eq!(store.process_chat(&no_session).await.unwrap_err().kind(), "invalid_request");
    }
}
