//! # Hub contract
//!
//! Wire shapes exchanged with the orchestration hub: the request/response
//! envelopes and the typed payload models of each operation.

pub mod envelope;
pub mod payloads;

pub use envelope::{
    ErrorInfo, PolicyHints, RequestEnvelope, RequestStatus, ResponseEnvelope, CASEFILE_ID_KEY,
    PARENT_REQUEST_KEY,
};
pub use payloads::{
    AddSessionToCasefileRequest, AddSessionToCasefileResponse, ChatRequest, ChatResponse,
    CreateCasefileRequest, CreateCasefileResponse, CreateCasefileWithSessionRequest,
    CreateCasefileWithSessionResponse, CreateSessionRequest, CreateSessionResponse,
    GetCasefileRequest, GetCasefileResponse, ResourceLink,
};
