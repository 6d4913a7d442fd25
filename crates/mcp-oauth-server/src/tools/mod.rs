//! MCP tool implementations.
//!
//! Each tool:
//! 1. Parses and validates its input
//! 2. Reads from the request context or the credential store
//! 3. Returns a JSON document as text content

mod auth;
mod clients;

pub use auth::ShowAuthTokenTool;
pub use clients::ListClientsTool;

use std::sync::Arc;

use crate::error::ToolResult;
use crate::provider::UserInfo;
use crate::server::oauth::CredentialStore;

/// Data scoped to the request that invoked a tool.
#[derive(Clone, Default)]
pub struct RequestContext {
    /// Value of the `x-request-id` header (generated when absent).
    pub request_id: String,
    /// Bearer token presented by the caller, if any.
    pub access_token: Option<String>,
    /// Profile of the token owner, when the token was verified.
    pub user: Option<UserInfo>,
}

impl RequestContext {
    #[must_use]
    pub fn new(request_id: impl Into<String>) -> Self {
        Self { request_id: request_id.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_bearer(mut self, access_token: impl Into<String>, user: UserInfo) -> Self {
        self.access_token = Some(access_token.into());
        self.user = Some(user);
        self
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("authenticated", &self.access_token.is_some())
            .finish()
    }
}

/// Tool execution context.
#[derive(Clone)]
pub struct ToolContext {
    /// Credential store shared with the authorization server.
    pub store: Arc<dyn CredentialStore>,
    /// Per-request data.
    pub request: RequestContext,
}

impl ToolContext {
    /// Create a new tool context.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, request: RequestContext) -> Self {
        Self { store, request }
    }
}

/// Trait for MCP tools.
#[async_trait::async_trait]
pub trait McpTool: Send + Sync {
    /// Tool name (e.g., "list_clients").
    fn name(&self) -> &'static str;

    /// Tool description for LLM.
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with given input.
    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String>;
}

/// Register all tools.
#[must_use]
pub fn register_all_tools() -> Vec<Box<dyn McpTool>> {
    vec![Box::new(ShowAuthTokenTool), Box::new(ListClientsTool)]
}
