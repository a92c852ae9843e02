//! Built-in capabilities: the casefile, tool-session, chat and composite
//! workflow methods, one tool bound to each, and their models.
//!
//! [`BUILTIN_CAPABILITIES_YAML`] declares the same methods in record form so
//! a drift check against the built-in catalog starts clean.

use crate::capabilities::{
    CapabilityRecord, CapabilityVerb, Classification, Complexity, Domain, IntegrationTier,
    Maturity, MethodDescriptor, MethodDescriptorBuilder, OwnerRef, Subdomain,
};
use crate::contract::{
    AddSessionToCasefileRequest, AddSessionToCasefileResponse, ChatRequest, ChatResponse,
    CreateCasefileRequest, CreateCasefileResponse, CreateCasefileWithSessionRequest,
    CreateCasefileWithSessionResponse, CreateSessionRequest, CreateSessionResponse,
    GetCasefileRequest, GetCasefileResponse,
};
use crate::error::HubError;
use crate::tools::{ToolBusinessRules, ToolDescriptor};

use super::CatalogBuilder;

pub const CREATE_CASEFILE: &str = "casefile.create";
pub const GET_CASEFILE: &str = "casefile.get";
pub const ADD_SESSION_TO_CASEFILE: &str = "casefile.add_session";
pub const CREATE_SESSION: &str = "tool_session.create";
pub const PROCESS_CHAT: &str = "chat.process";
pub const CREATE_CASEFILE_WITH_SESSION: &str = "workflow.create_casefile_with_session";

pub const BUILTIN_CAPABILITIES_YAML: &str = r#"
capabilities:
  - name: casefile.create
    domain: workspace
    subdomain: casefile
    capability: create
    service: CasefileService
    module: casefile
    function: create
    required_permissions: ["casefile:write"]
    request_model: CreateCasefileRequest
    response_model: CreateCasefileResponse
  - name: casefile.get
    domain: workspace
    subdomain: casefile
    capability: read
    service: CasefileService
    module: casefile
    function: get
    required_permissions: ["casefile:read"]
    request_model: GetCasefileRequest
    response_model: GetCasefileResponse
  - name: casefile.add_session
    domain: workspace
    subdomain: casefile
    capability: link
    service: CasefileService
    module: casefile
    function: add_session
    required_permissions: ["casefile:write"]
    request_model: AddSessionToCasefileRequest
    response_model: AddSessionToCasefileResponse
  - name: tool_session.create
    domain: workspace
    subdomain: tool_session
    capability: create
    service: SessionService
    module: tool_session
    function: create
    required_permissions: ["session:write"]
    request_model: CreateSessionRequest
    response_model: CreateSessionResponse
  - name: chat.process
    domain: communication
    subdomain: chat
    capability: process
    integration_tier: hybrid
    service: CommunicationService
    module: chat
    function: process_chat
    required_permissions: ["chat:use"]
    request_model: ChatRequest
    response_model: ChatResponse
  - name: workflow.create_casefile_with_session
    domain: automation
    subdomain: workflow
    capability: create
    complexity: composite
    maturity: beta
    service: RequestHub
    module: workflow
    function: create_casefile_with_session
    required_permissions: ["casefile:write", "session:write"]
    request_model: CreateCasefileWithSessionRequest
    response_model: CreateCasefileWithSessionResponse
"#;

/// Parsed form of [`BUILTIN_CAPABILITIES_YAML`].
pub fn builtin_records() -> Result<Vec<CapabilityRecord>, HubError> {
    CapabilityRecord::list_from_yaml(BUILTIN_CAPABILITIES_YAML)
}

fn method(
    name: &str,
    domain: Domain,
    subdomain: Subdomain,
    verb: CapabilityVerb,
    owner: (&str, &str, &str),
) -> MethodDescriptorBuilder {
    MethodDescriptor::builder(name, Classification::atomic(domain, subdomain, verb))
        .owner(OwnerRef::new(owner.0, owner.1, owner.2))
}

fn builtin_methods() -> Vec<MethodDescriptor> {
    vec![
        method(
            CREATE_CASEFILE,
            Domain::Workspace,
            Subdomain::Casefile,
            CapabilityVerb::Create,
            ("CasefileService", "casefile", "create"),
        )
        .description("Create a new casefile")
        .permissions(["casefile:write"])
        .transactional(true)
        .models::<CreateCasefileRequest, CreateCasefileResponse>()
        .build(),
        method(
            GET_CASEFILE,
            Domain::Workspace,
            Subdomain::Casefile,
            CapabilityVerb::Read,
            ("CasefileService", "casefile", "get"),
        )
        .description("Read a casefile by id")
        .permissions(["casefile:read"])
        .idempotent(true)
        .models::<GetCasefileRequest, GetCasefileResponse>()
        .build(),
        method(
            ADD_SESSION_TO_CASEFILE,
            Domain::Workspace,
            Subdomain::Casefile,
            CapabilityVerb::Link,
            ("CasefileService", "casefile", "add_session"),
        )
        .description("Link a tool session to a casefile")
        .permissions(["casefile:write"])
        .idempotent(true)
        .models::<AddSessionToCasefileRequest, AddSessionToCasefileResponse>()
        .build(),
        method(
            CREATE_SESSION,
            Domain::Workspace,
            Subdomain::ToolSession,
            CapabilityVerb::Create,
            ("SessionService", "tool_session", "create"),
        )
        .description("Start a tool session")
        .permissions(["session:write"])
        .models::<CreateSessionRequest, CreateSessionResponse>()
        .build(),
        MethodDescriptor::builder(
            PROCESS_CHAT,
            Classification::atomic(Domain::Communication, Subdomain::Chat, CapabilityVerb::Process)
                .with_integration_tier(IntegrationTier::Hybrid),
        )
        .owner(OwnerRef::new("CommunicationService", "chat", "process_chat"))
        .description("Process a chat message within a session")
        .permissions(["chat:use"])
        .models::<ChatRequest, ChatResponse>()
        .build(),
        MethodDescriptor::builder(
            CREATE_CASEFILE_WITH_SESSION,
            Classification::atomic(Domain::Automation, Subdomain::Workflow, CapabilityVerb::Create)
                .with_complexity(Complexity::Composite)
                .with_maturity(Maturity::Beta),
        )
        .owner(OwnerRef::new("RequestHub", "workflow", "create_casefile_with_session"))
        .description("Create a casefile and start a linked tool session")
        .permissions(["casefile:write", "session:write"])
        .models::<CreateCasefileWithSessionRequest, CreateCasefileWithSessionResponse>()
        .build(),
    ]
}

fn builtin_tools(methods: &[MethodDescriptor]) -> Vec<ToolDescriptor> {
    let find = |name: &str| methods.iter().find(|m| m.name == name);
    let mut tools = Vec::new();

    let specs: [(&str, &str, &str, ToolBusinessRules); 6] = [
        (
            "create_casefile_tool",
            CREATE_CASEFILE,
            "casefile",
            ToolBusinessRules {
                requires_auth: true,
                rate_limit_per_minute: Some(30),
                ..Default::default()
            },
        ),
        ("get_casefile_tool", GET_CASEFILE, "casefile", ToolBusinessRules::default()),
        (
            "add_session_to_casefile_tool",
            ADD_SESSION_TO_CASEFILE,
            "casefile",
            ToolBusinessRules {
                requires_auth: true,
                requires_casefile: true,
                max_retries: 2,
                ..Default::default()
            },
        ),
        (
            "create_session_tool",
            CREATE_SESSION,
            "session",
            ToolBusinessRules {
                requires_auth: true,
                ..Default::default()
            },
        ),
        (
            "chat_tool",
            PROCESS_CHAT,
            "communication",
            ToolBusinessRules {
                rate_limit_per_minute: Some(60),
                rate_limit_per_hour: Some(1000),
                timeout_seconds: Some(60),
                ..Default::default()
            },
        ),
        (
            "create_casefile_with_session_tool",
            CREATE_CASEFILE_WITH_SESSION,
            "workflow",
            ToolBusinessRules {
                requires_auth: true,
                ..Default::default()
            },
        ),
    ];

    for (tool_name, method_name, category, rules) in specs {
        let builder = ToolDescriptor::builder(tool_name).category(category).rules(rules);
        let builder = match find(method_name) {
            Some(method) => builder
                .description(method.description.clone())
                .tags([method.classification.capability.as_str(), category])
                .bind(method),
            None => builder.method_name(method_name),
        };
        tools.push(builder.build());
    }
    tools
}

/// Builder pre-populated with every built-in model, method and tool.
pub fn builtin_catalog() -> Result<CatalogBuilder, HubError> {
    let mut builder = CatalogBuilder::new();

    builder.register_model::<CreateCasefileRequest>()?;
    builder.register_model::<CreateCasefileResponse>()?;
    builder.register_model::<GetCasefileRequest>()?;
    builder.register_model::<GetCasefileResponse>()?;
    builder.register_model::<AddSessionToCasefileRequest>()?;
    builder.register_model::<AddSessionToCasefileResponse>()?;
    builder.register_model::<CreateSessionRequest>()?;
    builder.register_model::<CreateSessionResponse>()?;
    builder.register_model::<ChatRequest>()?;
    builder.register_model::<ChatResponse>()?;
    builder.register_model::<CreateCasefileWithSessionRequest>()?;
    builder.register_model::<CreateCasefileWithSessionResponse>()?;

    let methods = builtin_methods();
    for tool in builtin_tools(&methods) {
        builder.register_tool(tool)?;
    }
    for method in methods {
        builder.register_method(method)?;
    }

    Ok(builder)
}
