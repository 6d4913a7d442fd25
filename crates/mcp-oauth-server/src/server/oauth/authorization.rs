//! Authorization server: `/authorize`, `/token` and `/register` semantics.
//!
//! Stateless orchestrator over a [`CredentialStore`] and an [`IdentityProvider`].
//! One authorization attempt moves `Requested → CodeIssued → Exchanged`, or ends
//! in `Rejected` (validation failure) or `Expired` (code never exchanged).
//!
//! Validation always happens before any store or upstream call, and failures
//! are returned as errors, never as redirects.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::pkce::{self, ChallengeMethod};
use super::store::CredentialStore;
use super::types::{AuthorizationCode, Client, now_unix};
use crate::config::{Config, oauth};
use crate::error::{OAuthError, ProviderResult, StoreError};
use crate::provider::{AuthorizeParams, ExchangeParams, IdentityProvider, Token, UserInfo};

/// Query parameters of `GET /authorize`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeRequest {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub response_type: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// Form fields of `POST /token`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
}

/// RFC 7591 client metadata accepted by `POST /register`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub redirect_uris: Option<Vec<String>>,
    pub grant_types: Option<Vec<String>>,
    pub response_types: Option<Vec<String>>,
    pub scope: Option<String>,
    pub token_endpoint_auth_method: Option<String>,
    pub client_name: Option<String>,
}

/// RFC 7591 registration response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub client_id: String,
    pub client_secret: String,
    pub client_id_issued_at: i64,
    pub client_secret_expires_at: i64,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: String,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
}

impl From<Client> for RegistrationResponse {
    fn from(client: Client) -> Self {
        Self {
            client_id: client.id,
            client_secret: client.secret,
            client_id_issued_at: client.issued_at,
            client_secret_expires_at: client.secret_expires_at,
            redirect_uris: client.redirect_uris,
            grant_types: client.grant_types,
            response_types: client.response_types,
            token_endpoint_auth_method: client.token_endpoint_auth_method,
            scope: client.scope,
            client_name: client.client_name,
        }
    }
}

/// OAuth 2.0 authorization server backed by an upstream identity provider.
pub struct AuthorizationServer {
    store: Arc<dyn CredentialStore>,
    provider: Arc<dyn IdentityProvider>,
    base_url: String,
    metadata_url: String,
    resource_metadata_url: String,
    upstream_client_id: String,
    upstream_client_secret: String,
    code_lifetime: Duration,
    verified_tokens: Cache<String, UserInfo>,
}

fn required<'a>(value: Option<&'a String>, field: &str) -> Result<&'a str, OAuthError> {
    match value.map(String::as_str) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(OAuthError::invalid_request(format!("Missing {field}"))),
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

/// Resolve a client, reporting absence as `invalid_client`.
fn client_lookup_error(err: StoreError) -> OAuthError {
    match err {
        StoreError::NotFound(_) | StoreError::InvalidArgument(_) => {
            OAuthError::not_found("invalid_client", "Unknown client_id")
        }
        other => other.into(),
    }
}

impl AuthorizationServer {
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        provider: Arc<dyn IdentityProvider>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            provider,
            base_url: config.base_url.clone(),
            metadata_url: config.auth_server_metadata_url(),
            resource_metadata_url: config.protected_resource_metadata_url(),
            upstream_client_id: config.upstream_client_id.clone(),
            upstream_client_secret: config.upstream_client_secret.clone(),
            code_lifetime: config.auth_code_lifetime,
            verified_tokens: Cache::builder()
                .max_capacity(config.cache_max_size)
                .time_to_live(oauth::TOKEN_CACHE_TTL)
                .build(),
        }
    }

    /// The credential store this server writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Where clients find this resource's metadata (RFC 9728).
    #[must_use]
    pub fn resource_metadata_url(&self) -> &str {
        &self.resource_metadata_url
    }

    /// Validate an authorization request, issue a local code, and return the
    /// upstream authorize URL to redirect to.
    pub async fn authorize(&self, req: &AuthorizeRequest) -> Result<String, OAuthError> {
        let client_id = required(req.client_id.as_ref(), "client_id")?;
        let redirect_uri = required(req.redirect_uri.as_ref(), "redirect_uri")?;
        let response_type = required(req.response_type.as_ref(), "response_type")?;

        if response_type != "code" {
            return Err(OAuthError::invalid(
                "unsupported_response_type",
                "response_type must be 'code'",
            ));
        }

        let client = self.store.get_client(client_id).await.map_err(client_lookup_error)?;

        if !pkce::validate_redirect_uri(redirect_uri, &client.redirect_uris) {
            return Err(OAuthError::forbidden(
                "invalid_redirect_uri",
                "redirect_uri not registered for this client",
            ));
        }

        let challenge = match non_empty(req.code_challenge.as_ref()) {
            Some(challenge) => {
                let method: ChallengeMethod =
                    non_empty(req.code_challenge_method.as_ref()).unwrap_or("plain").parse()?;
                Some((challenge, method))
            }
            None if client.is_public() => {
                return Err(OAuthError::invalid_request("code_challenge required for public clients"));
            }
            None => None,
        };

        let scope: Vec<String> = non_empty(req.scope.as_ref())
            .unwrap_or(client.scope.as_str())
            .split_whitespace()
            .map(ToString::to_string)
            .collect();

        let mut code =
            AuthorizationCode::issue(client_id, redirect_uri, scope, self.code_lifetime);
        if let Some((challenge, method)) = challenge {
            code = code.with_challenge(challenge.to_string(), method.as_str().to_string());
        }
        self.store.save_authorization_code(&code).await?;

        let location = self.provider.authorize_url(&AuthorizeParams {
            client_id: &self.upstream_client_id,
            state: req.state.as_deref(),
            redirect_uri,
            scope: &code.scope,
            code_challenge: code.code_challenge.as_deref(),
            code_challenge_method: code.code_challenge_method.as_deref(),
        })?;

        tracing::info!(
            client_id = %client_id,
            provider = self.provider.name(),
            pkce = code.code_challenge.is_some(),
            "Issued authorization code, redirecting upstream"
        );
        Ok(location)
    }

    /// Validate a token request, consume the pending code, and exchange the
    /// upstream code for a token.
    pub async fn token(&self, req: &TokenRequest) -> Result<Token, OAuthError> {
        let grant_type = required(req.grant_type.as_ref(), "grant_type")?;
        if grant_type != "authorization_code" {
            return Err(OAuthError::invalid(
                "unsupported_grant_type",
                format!("Unsupported grant_type: {grant_type}"),
            ));
        }
        let upstream_code = required(req.code.as_ref(), "code")?;
        let client_id = required(req.client_id.as_ref(), "client_id")?;
        let redirect_uri = required(req.redirect_uri.as_ref(), "redirect_uri")?;

        let client = self.store.get_client(client_id).await.map_err(client_lookup_error)?;
        if !client.is_public() {
            let presented = non_empty(req.client_secret.as_ref()).ok_or_else(|| {
                OAuthError::invalid("invalid_client", "Missing client_secret")
            })?;
            if !bool::from(presented.as_bytes().ct_eq(client.secret.as_bytes())) {
                return Err(OAuthError::forbidden("invalid_client", "Client authentication failed"));
            }
        }

        let pending = self.store.get_authorization_code(client_id).await.map_err(|err| match err {
            StoreError::NotFound(_) => OAuthError::not_found("invalid_grant", "invalid code"),
            other => other.into(),
        })?;

        if pending.redirect_uri != redirect_uri {
            return Err(OAuthError::forbidden("invalid_grant", "redirect_uri mismatch"));
        }

        let code_verifier = non_empty(req.code_verifier.as_ref());
        if let Some(challenge) = pending.code_challenge.as_deref() {
            let Some(verifier) = code_verifier else {
                return Err(OAuthError::forbidden("invalid_grant", "Missing code_verifier"));
            };
            let method = pending.code_challenge_method.as_deref().unwrap_or("plain");
            if !pkce::verify(verifier, challenge, method)? {
                return Err(OAuthError::forbidden("invalid_grant", "PKCE verification failed"));
            }
        }

        // Single use: only the request whose delete succeeds may proceed.
        self.store.delete_authorization_code(client_id).await.map_err(|err| match err {
            StoreError::NotFound(_) => {
                OAuthError::not_found("invalid_grant", "authorization code already used")
            }
            other => other.into(),
        })?;

        let token = self
            .provider
            .exchange_token(&ExchangeParams {
                client_id: &self.upstream_client_id,
                client_secret: &self.upstream_client_secret,
                code: upstream_code,
                redirect_uri,
                code_verifier,
            })
            .await?;

        let user = self.provider.fetch_user_info(&token.access_token).await?;
        tracing::info!(
            client_id = %client_id,
            provider = self.provider.name(),
            login = user.login.as_deref().unwrap_or("-"),
            email = user.email.as_deref().unwrap_or("-"),
            "Exchanged authorization code for upstream token"
        );

        Ok(token)
    }

    /// Register a new client (RFC 7591).
    pub async fn register(&self, req: RegisterRequest) -> Result<RegistrationResponse, OAuthError> {
        let redirect_uris = req.redirect_uris.unwrap_or_default();
        if redirect_uris.is_empty() {
            return Err(OAuthError::invalid("invalid_client_metadata", "redirect_uris is required"));
        }
        if let Some(bad) = redirect_uris.iter().find(|uri| !pkce::is_registrable_redirect_uri(uri)) {
            return Err(OAuthError::invalid(
                "invalid_redirect_uri",
                format!("redirect_uri is not an absolute URI: {bad}"),
            ));
        }

        let auth_method = req
            .token_endpoint_auth_method
            .unwrap_or_else(|| oauth::DEFAULT_AUTH_METHOD.to_string());
        if !oauth::AUTH_METHODS_SUPPORTED.contains(&auth_method.as_str()) {
            return Err(OAuthError::invalid(
                "invalid_client_metadata",
                format!("Unsupported token_endpoint_auth_method: {auth_method}"),
            ));
        }

        let defaults = |values: &[&str]| values.iter().map(ToString::to_string).collect::<Vec<_>>();
        let client = Client {
            id: uuid::Uuid::new_v4().simple().to_string(),
            secret: pkce::generate_token(),
            redirect_uris,
            grant_types: req
                .grant_types
                .filter(|g| !g.is_empty())
                .unwrap_or_else(|| defaults(oauth::DEFAULT_GRANT_TYPES)),
            response_types: req
                .response_types
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| defaults(oauth::DEFAULT_RESPONSE_TYPES)),
            token_endpoint_auth_method: auth_method,
            scope: req
                .scope
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| oauth::DEFAULT_SCOPE.to_string()),
            client_name: req.client_name,
            issued_at: now_unix(),
            secret_expires_at: 0,
        };

        self.store.create_client(&client).await?;
        tracing::info!(client_id = %client.id, backend = self.store.backend_name(), "Registered OAuth client");

        Ok(client.into())
    }

    /// Check a bearer token presented to the protected resource.
    ///
    /// The provider is the authority: a token is valid if it can read the
    /// owner's profile. Successful checks are remembered briefly.
    pub async fn verify_access_token(&self, access_token: &str) -> ProviderResult<UserInfo> {
        if let Some(user) = self.verified_tokens.get(access_token).await {
            return Ok(user);
        }
        let user = self.provider.fetch_user_info(access_token).await?;
        self.verified_tokens.insert(access_token.to_string(), user.clone()).await;
        Ok(user)
    }

    /// RFC 8414 authorization server metadata.
    #[must_use]
    pub fn authorization_server_metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "issuer": self.base_url,
            "authorization_endpoint": format!("{}/authorize", self.base_url),
            "token_endpoint": format!("{}/token", self.base_url),
            "registration_endpoint": format!("{}/register", self.base_url),
            "scopes_supported": oauth::SCOPES_SUPPORTED,
            "response_types_supported": ["code"],
            "grant_types_supported": ["authorization_code"],
            "token_endpoint_auth_methods_supported": oauth::AUTH_METHODS_SUPPORTED,
            "code_challenge_methods_supported": oauth::CODE_CHALLENGE_METHODS
        })
    }

    /// RFC 9728 protected resource metadata.
    #[must_use]
    pub fn protected_resource_metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "resource": self.base_url,
            "authorization_servers": [self.base_url],
            "authorization_server_metadata": self.metadata_url,
            "bearer_methods_supported": ["header"],
            "scopes_supported": oauth::SCOPES_SUPPORTED
        })
    }
}

impl std::fmt::Debug for AuthorizationServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationServer")
            .field("base_url", &self.base_url)
            .field("provider", &self.provider.name())
            .field("store", &self.store.backend_name())
            .finish()
    }
}
