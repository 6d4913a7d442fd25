//! OAuth 2.0 endpoint handlers.
//!
//! Implements:
//! - RFC 9728: OAuth Protected Resource Metadata
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (plain, S256)
//! - RFC 6749: OAuth 2.0 Authorization Code Grant
//!
//! Handlers only translate HTTP to [`AuthorizationServer`] calls and back.
//! Errors render through [`OAuthError`]'s `IntoResponse`, so a rejected
//! `/authorize` never redirects. Extractor rejections take the same path and
//! answer `invalid_request` in JSON.

use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{
        Query, State,
        rejection::{FormRejection, JsonRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::authorization::{AuthorizeRequest, RegisterRequest, TokenRequest};
use crate::error::OAuthError;
use crate::provider::Token;
use crate::server::transport::HttpState;

// ─── RFC 9728: Protected Resource Metadata ───────────────────────────────────

/// `GET /.well-known/oauth-protected-resource`
pub async fn handle_protected_resource(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(state.oauth.protected_resource_metadata())
}

// ─── RFC 8414: Authorization Server Metadata ─────────────────────────────────

/// `GET /.well-known/oauth-authorization-server`
pub async fn handle_auth_server_metadata(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(state.oauth.authorization_server_metadata())
}

// ─── RFC 7591: Dynamic Client Registration ───────────────────────────────────

/// `POST /register`
pub async fn handle_register(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, OAuthError> {
    let Json(req) = body?;
    let registration = state.oauth.register(req).await?;
    Ok((StatusCode::CREATED, Json(registration)).into_response())
}

// ─── Authorization Endpoint ──────────────────────────────────────────────────

/// `GET /authorize`
///
/// Issues a local code and sends the user agent to the upstream provider.
pub async fn handle_authorize(
    State(state): State<Arc<HttpState>>,
    query: Result<Query<AuthorizeRequest>, QueryRejection>,
) -> Result<Response, OAuthError> {
    let Query(query) = query?;
    let location = state.oauth.authorize(&query).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

// ─── Token Endpoint ──────────────────────────────────────────────────────────

/// `POST /token`
pub async fn handle_token(
    State(state): State<Arc<HttpState>>,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Result<Response, OAuthError> {
    let Form(form) = form?;
    let token = state.oauth.token(&form).await?;
    Ok(token_success(&token))
}

/// Token response with the cache headers RFC 6749 §5.1 requires.
fn token_success(token: &Token) -> Response {
    let mut response = Json(token).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}
