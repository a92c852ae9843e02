//! Composite workflows.
//!
//! ```text
//! workflow.create_casefile_with_session
//!   1. casefile.create        (sub-request)          → casefile_id
//!   2. tool_session.create    (metadata.casefile_id)  → session_id   [auto_start_session]
//!   3. casefile.add_session   (casefile_id, session_id)              [auto_start_session]
//! ```
//!
//! Steps run strictly in order, each awaited before the next. Sub-requests go
//! straight to the services: they carry no hooks and only the outer dispatch
//! records hook events. A failing step aborts the workflow; earlier steps are
//! not rolled back.

use std::sync::Arc;

use serde_json::Value;

use crate::catalog::{ADD_SESSION_TO_CASEFILE, CREATE_CASEFILE, CREATE_SESSION};
use crate::contract::{
    AddSessionToCasefileRequest, CreateCasefileRequest, CreateCasefileWithSessionRequest,
    CreateCasefileWithSessionResponse, CreateSessionRequest, RequestEnvelope, ResourceLink,
    CASEFILE_ID_KEY,
};
use crate::services::{ServiceError, Services};

pub async fn create_casefile_with_session(
    services: Arc<Services>,
    request: RequestEnvelope<CreateCasefileWithSessionRequest>,
) -> Result<CreateCasefileWithSessionResponse, ServiceError> {
    let payload = &request.payload;

    let create = request.sub_request(
        CREATE_CASEFILE,
        CreateCasefileRequest {
            title: payload.title.clone(),
            description: payload.description.clone(),
            tags: payload.tags.clone(),
        },
    );
    let casefile = services.casefile_service.create(&create).await?;
    let casefile_id = casefile.casefile_id;
    log::debug!("Workflow {}: created casefile {}", request.request_id, casefile_id);

    if !payload.auto_start_session {
        return Ok(CreateCasefileWithSessionResponse {
            casefile_id,
            session_id: None,
            links: Vec::new(),
        });
    }

    let start = request
        .sub_request(
            CREATE_SESSION,
            CreateSessionRequest {
                title: payload.session_title.clone(),
            },
        )
        .with_metadata(CASEFILE_ID_KEY, Value::String(casefile_id.clone()));
    let session_id = services.session_service.create(&start).await?.session_id;

    let link = request.sub_request(
        ADD_SESSION_TO_CASEFILE,
        AddSessionToCasefileRequest {
            casefile_id: casefile_id.clone(),
            session_id: session_id.clone(),
        },
    );
    services.casefile_service.add_session(&link).await?;
    log::debug!(
        "Workflow {}: linked session {} to casefile {}",
        request.request_id,
        session_id,
        casefile_id
    );

    Ok(CreateCasefileWithSessionResponse {
        links: vec![ResourceLink {
            primary_id: casefile_id.clone(),
            dependent_id: session_id.clone(),
        }],
        casefile_id,
        session_id: Some(session_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{CreateSessionResponse, PARENT_REQUEST_KEY};
    use crate::services::{InMemoryStore, SessionService};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    fn request(auto_start: bool) -> RequestEnvelope<CreateCasefileWithSessionRequest> {
        RequestEnvelope::new(
            "workflow.create_casefile_with_session",
            CreateCasefileWithSessionRequest {
                title: "Outage review".into(),
                description: None,
                tags: vec!["ops".into()],
                auto_start_session: auto_start,
                session_title: Some("triage".into()),
            },
        )
        .with_user("alice")
    }

    #[tokio::test]
    async fn test_auto_start_links_once() {
        let store = Arc::new(InMemoryStore::new());
        let services = Arc::new(Services::in_memory(store.clone()));

        let response = create_casefile_with_session(services, request(true)).await.unwrap();
        let session_id = response.session_id.clone().unwrap();

        assert_eq!(store.casefile_count(), 1);
        assert_eq!(store.session_count(), 1);
        assert_eq!(response.links.len(), 1);
        assert_eq!(response.links[0].primary_id, response.casefile_id);
        assert_eq!(response.links[0].dependent_id, session_id);

        let casefile = store.casefile(&response.casefile_id).unwrap();
        assert_eq!(casefile.session_ids, vec![session_id.clone()]);
        assert_eq!(casefile.owner.as_deref(), Some("alice"));
        let session = store.session(&session_id).unwrap();
        assert_eq!(session.casefile_id.as_deref(), Some(response.casefile_id.as_str()));
        assert_eq!(session.title.as_deref(), Some("triage"));
    }

    #[tokio::test]
    async fn test_without_auto_start() {
        let store = Arc::new(InMemoryStore::new());
        let services = Arc::new(Services::in_memory(store.clone()));

        let response = create_casefile_with_session(services, request(false)).await.unwrap();
        assert!(response.session_id.is_none());
        assert!(response.links.is_empty());
        assert_eq!(store.session_count(), 0);
    }

    struct RecordingSessions {
        seen: Mutex<Vec<RequestEnvelope<CreateSessionRequest>>>,
    }

    #[async_trait]
    impl SessionService for RecordingSessions {
        async fn create(
            &self,
            request: &RequestEnvelope<CreateSessionRequest>,
        ) -> Result<CreateSessionResponse, ServiceError> {
            self.seen.lock().push(request.clone());
            Err(ServiceError::Unavailable("session store down".into()))
        }
    }

    #[tokio::test]
    async fn test_failing_step_aborts_after_primary() {
        let store = Arc::new(InMemoryStore::new());
        let recorder = Arc::new(RecordingSessions {
            seen: Mutex::new(Vec::new()),
        });
        let mut services = Services::in_memory(store.clone());
        services.session_service = recorder.clone();

        let outer = request(true);
        let outer_id = outer.request_id.clone();
        let err = create_casefile_with_session(Arc::new(services), outer).await.unwrap_err();
        assert_eq!(err.kind(), "unavailable");
        assert_eq!(store.casefile_count(), 1);

        let seen = recorder.seen.lock();
        assert_eq!(seen.len(), 1);
        let sub = &seen[0];
        assert_ne!(sub.request_id, outer_id);
        assert_eq!(sub.metadata[PARENT_REQUEST_KEY], Value::String(outer_id));
        assert!(sub.metadata_casefile_id().is_some());
        assert!(sub.hooks.is_empty());
        assert_eq!(sub.user_id.as_deref(), Some("alice"));
    }
}
