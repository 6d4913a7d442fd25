//! HTTP transport.
//!
//! One router serves the OAuth endpoints, the well-known metadata documents,
//! health probes and the bearer-protected MCP endpoint. Every request gets an
//! `x-request-id` (taken from the caller or generated) that is echoed in the
//! response and handed to tools through [`RequestContext`].

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use super::oauth::{AuthorizationServer, handlers};
use crate::error::{OAuthError, ProviderError, StoreError};
use crate::tools::{McpTool, RequestContext, ToolContext};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcResponse {
    /// JSON-RPC version constant.
    const VERSION: &'static str = "2.0";

    #[must_use]
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self { jsonrpc: Cow::Borrowed(Self::VERSION), result: Some(result), error: None, id }
    }

    #[must_use]
    pub fn error(id: Option<serde_json::Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(Self::VERSION),
            result: None,
            error: Some(JsonRpcError { code, message: message.into(), data: None }),
            id,
        }
    }
}

/// MCP tool info for tools/list response.
#[derive(Debug, Serialize)]
pub struct McpToolInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub oauth: Arc<AuthorizationServer>,
    pub tools: Vec<Box<dyn McpTool>>,
}

/// Create the HTTP router.
pub fn create_router(oauth: Arc<AuthorizationServer>, tools: Vec<Box<dyn McpTool>>) -> Router {
    let state = Arc::new(HttpState { oauth, tools });

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "http",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = %request_id
        )
    });

    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // Discovery
        .route("/.well-known/oauth-protected-resource", get(handlers::handle_protected_resource))
        .route("/.well-known/oauth-authorization-server", get(handlers::handle_auth_server_metadata))
        // OAuth endpoints
        .route("/register", post(handlers::handle_register))
        .route("/authorize", get(handlers::handle_authorize))
        .route("/token", post(handlers::handle_token))
        // Streamable HTTP transport - single endpoint
        .route("/mcp", post(handle_mcp_post))
        .layer(CorsLayer::permissive())
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(trace)
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mcp-oauth-server",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Ready when the credential store answers a lookup.
async fn readiness_check(State(state): State<Arc<HttpState>>) -> Response {
    let store = state.oauth.store();
    let (status, label) = match store.get_client("readiness-probe").await {
        Ok(_) | Err(StoreError::NotFound(_)) => (StatusCode::OK, "ready"),
        Err(err) => {
            tracing::warn!(error = %err, backend = store.backend_name(), "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };

    let body = Json(serde_json::json!({
        "status": label,
        "service": "mcp-oauth-server",
        "version": env!("CARGO_PKG_VERSION"),
        "store": store.backend_name(),
        "tools": state.tools.len()
    }));
    (status, body).into_response()
}

/// Extract the token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// 401 pointing the client at the protected resource metadata (RFC 9728 §5.1).
fn unauthorized(state: &HttpState, description: &str) -> Response {
    let challenge = format!(r#"Bearer resource_metadata="{}""#, state.oauth.resource_metadata_url());
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, challenge)],
        Json(serde_json::json!({
            "error": "invalid_token",
            "error_description": description
        })),
    )
        .into_response()
}

/// Authenticate the caller and build its request context.
async fn authenticate(state: &HttpState, headers: &HeaderMap) -> Result<RequestContext, Response> {
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), ToString::to_string);

    let Some(token) = bearer_token(headers) else {
        return Err(unauthorized(state, "Missing bearer token"));
    };

    match state.oauth.verify_access_token(token).await {
        Ok(user) => Ok(RequestContext::new(request_id).with_bearer(token, user)),
        Err(ProviderError::Status { status: 401 | 403, .. }) => {
            Err(unauthorized(state, "Bearer token rejected by identity provider"))
        }
        Err(err) => Err(OAuthError::from(err).into_response()),
    }
}

/// Handle POST requests to /mcp (Streamable HTTP transport)
async fn handle_mcp_post(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match authenticate(&state, &headers).await {
        Ok(request) => request,
        Err(response) => return response,
    };

    let req: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return Json(JsonRpcResponse::error(None, -32700, format!("Parse error: {e}")))
                .into_response();
        }
    };

    tracing::debug!(method = %req.method, request_id = %request.request_id, "Handling MCP POST request");

    let ctx = ToolContext::new(Arc::clone(state.oauth.store()), request);
    match dispatch(&req, &state.tools, &ctx).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Route one JSON-RPC message. Notifications yield no response.
pub async fn dispatch(
    req: &JsonRpcRequest,
    tools: &[Box<dyn McpTool>],
    ctx: &ToolContext,
) -> Option<JsonRpcResponse> {
    let id = req.id.clone();
    let is_notification = id.is_none();

    let response = match req.method.as_str() {
        "initialize" => JsonRpcResponse::success(id, handle_initialize(&req.params)),
        "tools/list" => handle_tools_list(id, tools),
        "tools/call" => handle_tools_call(id, &req.params, tools, ctx).await,
        "ping" | "notifications/initialized" | "initialized" | "notifications/cancelled" => {
            JsonRpcResponse::success(id, serde_json::json!({}))
        }
        _ => JsonRpcResponse::error(id, -32601, format!("Method not found: {}", req.method)),
    };

    (!is_notification).then_some(response)
}

fn handle_initialize(params: &serde_json::Value) -> serde_json::Value {
    let protocol_version =
        params.get("protocolVersion").and_then(|v| v.as_str()).unwrap_or("2024-11-05");

    tracing::info!("MCP initialize: protocol version {}", protocol_version);

    serde_json::json!({
        "protocolVersion": protocol_version,
        "capabilities": {
            "tools": {
                "listChanged": false
            }
        },
        "serverInfo": {
            "name": "mcp-oauth-server",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn handle_tools_list(id: Option<serde_json::Value>, tools: &[Box<dyn McpTool>]) -> JsonRpcResponse {
    let tool_list: Vec<McpToolInfo> = tools
        .iter()
        .map(|t| McpToolInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema(),
        })
        .collect();

    JsonRpcResponse::success(id, serde_json::json!({ "tools": tool_list }))
}

async fn handle_tools_call(
    id: Option<serde_json::Value>,
    params: &serde_json::Value,
    tools: &[Box<dyn McpTool>],
    ctx: &ToolContext,
) -> JsonRpcResponse {
    let Some(tool_name) = params.get("name").and_then(|v| v.as_str()) else {
        return JsonRpcResponse::error(id, -32602, "Missing 'name' parameter");
    };

    let arguments = params.get("arguments").cloned().unwrap_or_else(|| serde_json::json!({}));

    let Some(tool) = tools.iter().find(|t| t.name() == tool_name) else {
        return JsonRpcResponse::error(id, -32602, format!("Tool not found: {tool_name}"));
    };

    tracing::info!(tool = %tool_name, request_id = %ctx.request.request_id, "Executing tool");

    match tool.execute(ctx, arguments).await {
        Ok(result) => JsonRpcResponse::success(
            id,
            serde_json::json!({
                "content": [{
                    "type": "text",
                    "text": result
                }]
            }),
        ),
        Err(e) => {
            tracing::error!(tool = %tool_name, error = %e, "Tool execution failed");
            JsonRpcResponse::error(id, -32000, e.to_user_message())
        }
    }
}
