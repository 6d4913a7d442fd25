//! Auth tools: show_auth_token.

use serde_json::json;

use super::{McpTool, ToolContext};
use crate::error::{ToolError, ToolResult};

/// Echo the bearer token the caller authenticated with.
pub struct ShowAuthTokenTool;

#[async_trait::async_trait]
impl McpTool for ShowAuthTokenTool {
    fn name(&self) -> &'static str {
        "show_auth_token"
    }

    fn description(&self) -> &'static str {
        "Show the OAuth access token this request was authenticated with, and its owner."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, ctx: &ToolContext, _input: serde_json::Value) -> ToolResult<String> {
        let token = ctx.request.access_token.as_deref().ok_or(ToolError::Unauthenticated)?;
        let user = ctx.request.user.clone().unwrap_or_default();

        let output = json!({
            "access_token": token,
            "login": user.login,
            "name": user.name,
            "email": user.email,
            "request_id": ctx.request.request_id
        });
        Ok(serde_json::to_string_pretty(&output)?)
    }
}
