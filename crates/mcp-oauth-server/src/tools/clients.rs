//! Client tools: list_clients.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{McpTool, ToolContext};
use crate::error::{ToolError, ToolResult};
use crate::server::oauth::Client;

const MAX_LIMIT: usize = 1000;

fn default_limit() -> usize {
    100
}

/// Input for `list_clients`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListClientsInput {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Client record as shown to tool callers. Never carries the secret.
#[derive(Debug, Serialize)]
struct ClientSummary<'a> {
    client_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_name: Option<&'a str>,
    redirect_uris: &'a [String],
    grant_types: &'a [String],
    token_endpoint_auth_method: &'a str,
    scope: &'a str,
    client_id_issued_at: i64,
}

impl<'a> From<&'a Client> for ClientSummary<'a> {
    fn from(client: &'a Client) -> Self {
        Self {
            client_id: &client.id,
            client_name: client.client_name.as_deref(),
            redirect_uris: &client.redirect_uris,
            grant_types: &client.grant_types,
            token_endpoint_auth_method: &client.token_endpoint_auth_method,
            scope: &client.scope,
            client_id_issued_at: client.issued_at,
        }
    }
}

/// List dynamically registered OAuth clients.
pub struct ListClientsTool;

#[async_trait::async_trait]
impl McpTool for ListClientsTool {
    fn name(&self) -> &'static str {
        "list_clients"
    }

    fn description(&self) -> &'static str {
        "List OAuth clients registered with this server (secrets are never included)."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_LIMIT,
                    "default": 100,
                    "description": "Maximum number of clients to return"
                }
            }
        })
    }

    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String> {
        let params: ListClientsInput = serde_json::from_value(input)?;
        if params.limit == 0 || params.limit > MAX_LIMIT {
            return Err(ToolError::validation("limit", format!("must be between 1 and {MAX_LIMIT}")));
        }

        let mut clients = ctx.store.list_clients().await?;
        clients.sort_by(|a, b| a.issued_at.cmp(&b.issued_at).then_with(|| a.id.cmp(&b.id)));
        let total = clients.len();

        let summaries: Vec<ClientSummary<'_>> =
            clients.iter().take(params.limit).map(ClientSummary::from).collect();

        let output = json!({
            "total": total,
            "returned": summaries.len(),
            "clients": summaries
        });
        Ok(serde_json::to_string_pretty(&output)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::server::oauth::CredentialStore;
    use crate::server::oauth::store::MemoryStore;
    use crate::tools::RequestContext;

    fn client(id: &str, issued_at: i64) -> Client {
        Client {
            id: id.into(),
            secret: format!("secret-{id}"),
            redirect_uris: vec!["http://localhost/cb".into()],
            grant_types: vec!["authorization_code".into()],
            response_types: vec!["code".into()],
            token_endpoint_auth_method: "client_secret_post".into(),
            scope: "openid".into(),
            client_name: Some(format!("App {id}")),
            issued_at,
            secret_expires_at: 0,
        }
    }

    async fn context_with(clients: &[Client]) -> ToolContext {
        let store = Arc::new(MemoryStore::new());
        for c in clients {
            store.create_client(c).await.unwrap();
        }
        ToolContext::new(store, RequestContext::new("req"))
    }

    #[tokio::test]
    async fn test_lists_clients_without_secrets() {
        let ctx = context_with(&[client("b", 2), client("a", 1)]).await;

        let output = ListClientsTool.execute(&ctx, json!({})).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["total"], 2);
        assert_eq!(value["clients"][0]["client_id"], "a");
        assert_eq!(value["clients"][1]["client_name"], "App b");
        assert!(!output.contains("secret-a"));
    }

    #[tokio::test]
    async fn test_limit_is_applied_and_validated() {
        let ctx = context_with(&[client("a", 1), client("b", 2), client("c", 3)]).await;

        let output = ListClientsTool.execute(&ctx, json!({"limit": 2})).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["total"], 3);
        assert_eq!(value["returned"], 2);

        let err = ListClientsTool.execute(&ctx, json!({"limit": 0})).await.unwrap_err();
        assert!(matches!(err, ToolError::Validation { .. }));
    }
}
