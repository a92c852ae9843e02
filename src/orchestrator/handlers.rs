//! Operation table: a fixed `operation -> handler` map built at construction.
//!
//! A handler turns a wire envelope into a [`PendingCall`] in two phases.
//! `prepare` decodes the payload synchronously and may fail with a
//! [`ValidationError`]; the returned future does nothing until awaited, so a
//! rejected request never reaches a service.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::workflow;
use crate::catalog::{
    ADD_SESSION_TO_CASEFILE, CREATE_CASEFILE, CREATE_CASEFILE_WITH_SESSION, CREATE_SESSION,
    GET_CASEFILE, PROCESS_CHAT,
};
use crate::contract::{
    AddSessionToCasefileRequest, AddSessionToCasefileResponse, ChatRequest, ChatResponse,
    CreateCasefileRequest, CreateCasefileResponse, CreateSessionRequest, CreateSessionResponse,
    GetCasefileRequest, GetCasefileResponse, RequestEnvelope,
};
use crate::error::{HubError, RegistryKind, ValidationError};
use crate::policy::SESSION_OBSERVER_POLICY;
use crate::services::{ServiceError, Services};

/// The core operation of a dispatch, not yet started.
pub type PendingCall = BoxFuture<'static, Result<Value, ServiceError>>;

pub trait OperationHandler: Send + Sync {
    /// Decode `request` and bind it to `services`. No side effects.
    fn prepare(&self, request: &RequestEnvelope, services: &Arc<Services>) -> Result<PendingCall, ValidationError>;
}

/// Adapts an async fn over a typed request model into an [`OperationHandler`].
pub struct TypedHandler<Req, F> {
    f: F,
    _request: PhantomData<fn(Req)>,
}

impl<Req, Resp, F, Fut> OperationHandler for TypedHandler<Req, F>
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + 'static,
    F: Fn(Arc<Services>, RequestEnvelope<Req>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Resp, ServiceError>> + Send + 'static,
{
    fn prepare(&self, request: &RequestEnvelope, services: &Arc<Services>) -> Result<PendingCall, ValidationError> {
        let typed = request.decode::<Req>()?;
        let call = (self.f)(Arc::clone(services), typed);
        Ok(async move {
            let response = call.await?;
            serde_json::to_value(response).map_err(|e| ServiceError::Internal(e.to_string()))
        }
        .boxed())
    }
}

/// Wrap `f` as a shareable handler.
pub fn typed<Req, Resp, F, Fut>(f: F) -> Arc<dyn OperationHandler>
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + 'static,
    F: Fn(Arc<Services>, RequestEnvelope<Req>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, ServiceError>> + Send + 'static,
{
    Arc::new(TypedHandler {
        f,
        _request: PhantomData,
    })
}

/// One entry of the operation table.
#[derive(Clone)]
pub struct OperationRoute {
    /// Method the operation executes.
    pub method: String,
    /// Policy applied when the request carries no hint.
    pub default_policy: Option<String>,
    pub handler: Arc<dyn OperationHandler>,
}

impl fmt::Debug for OperationRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRoute")
            .field("method", &self.method)
            .field("default_policy", &self.default_policy)
            .finish_non_exhaustive()
    }
}

impl OperationRoute {
    pub fn new(method: impl Into<String>, handler: Arc<dyn OperationHandler>) -> Self {
        Self {
            method: method.into(),
            default_policy: None,
            handler,
        }
    }

    pub fn with_default_policy(mut self, policy: impl Into<String>) -> Self {
        self.default_policy = Some(policy.into());
        self
    }
}

#[derive(Clone, Default)]
pub struct OperationTable {
    routes: HashMap<String, OperationRoute>,
}

impl fmt::Debug for OperationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationTable")
            .field("operations", &self.names())
            .finish()
    }
}

impl OperationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The casefile, session, chat and composite workflow operations.
    pub fn builtin() -> Self {
        let routes = [
            OperationRoute::new(CREATE_CASEFILE, typed(create_casefile)),
            OperationRoute::new(GET_CASEFILE, typed(get_casefile)),
            OperationRoute::new(ADD_SESSION_TO_CASEFILE, typed(add_session)),
            OperationRoute::new(CREATE_SESSION, typed(create_session)),
            OperationRoute::new(PROCESS_CHAT, typed(process_chat)).with_default_policy(SESSION_OBSERVER_POLICY),
            OperationRoute::new(
                CREATE_CASEFILE_WITH_SESSION,
                typed(workflow::create_casefile_with_session),
            ),
        ];

        let mut table = Self::new();
        for route in routes {
            let operation = route.method.clone();
            table.routes.insert(operation, route);
        }
        table
    }

    pub fn register(&mut self, operation: impl Into<String>, route: OperationRoute) -> Result<(), HubError> {
        let operation = operation.into();
        if self.routes.contains_key(&operation) {
            return Err(HubError::RegistrationConflict {
                kind: RegistryKind::Operation,
                name: operation,
            });
        }
        self.routes.insert(operation, route);
        Ok(())
    }

    pub fn get(&self, operation: &str) -> Option<&OperationRoute> {
        self.routes.get(operation)
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.routes.contains_key(operation)
    }

    /// Sorted operation names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Operation name routed to `method`, if any.
    pub fn operation_for_method(&self, method: &str) -> Option<&str> {
        self.routes
            .iter()
            .find(|(_, route)| route.method == method)
            .map(|(operation, _)| operation.as_str())
    }
}

// ---------------------------------------------------------------------------
// Atomic operations
// ---------------------------------------------------------------------------

async fn create_casefile(
    services: Arc<Services>,
    request: RequestEnvelope<CreateCasefileRequest>,
) -> Result<CreateCasefileResponse, ServiceError> {
    services.casefile_service.create(&request).await
}

async fn get_casefile(
    services: Arc<Services>,
    request: RequestEnvelope<GetCasefileRequest>,
) -> Result<GetCasefileResponse, ServiceError> {
    services.casefile_service.get(&request).await
}

async fn add_session(
    services: Arc<Services>,
    request: RequestEnvelope<AddSessionToCasefileRequest>,
) -> Result<AddSessionToCasefileResponse, ServiceError> {
    services.casefile_service.add_session(&request).await
}

async fn create_session(
    services: Arc<Services>,
    request: RequestEnvelope<CreateSessionRequest>,
) -> Result<CreateSessionResponse, ServiceError> {
    services.session_service.create(&request).await
}

async fn process_chat(
    services: Arc<Services>,
    request: RequestEnvelope<ChatRequest>,
) -> Result<ChatResponse, ServiceError> {
    services.communication.process_chat(&request).await
}
