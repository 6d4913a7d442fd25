//! OAuth 2.0 records owned by the credential store.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Current wall-clock time in unix seconds.
#[must_use]
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A pending authorization grant, keyed by the client that requested it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,
    pub created_at: i64,
    pub expires_at: i64,
}

impl AuthorizationCode {
    /// Mint a code that expires `lifetime` from now.
    #[must_use]
    pub fn issue(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: Vec<String>,
        lifetime: Duration,
    ) -> Self {
        let created_at = now_unix();
        Self {
            code: super::pkce::generate_token(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scope,
            code_challenge: None,
            code_challenge_method: None,
            created_at,
            expires_at: created_at + lifetime.as_secs() as i64,
        }
    }

    /// Bind a PKCE challenge to this code.
    #[must_use]
    pub fn with_challenge(mut self, challenge: String, method: String) -> Self {
        self.code_challenge = Some(challenge);
        self.code_challenge_method = Some(method);
        self
    }

    /// A code is valid only while `now < expires_at`.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Check expiry against the wall clock.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_unix())
    }

    /// Seconds left before expiry (zero or negative once expired).
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        self.expires_at - now_unix()
    }
}

/// A dynamically registered OAuth client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    #[serde(default)]
    pub secret: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: String,
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    pub issued_at: i64,
    /// Zero means the secret never expires.
    #[serde(default)]
    pub secret_expires_at: i64,
}

impl Client {
    /// Public clients authenticate with PKCE only.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.token_endpoint_auth_method == "none"
    }
}

// Keep secrets out of logs.
impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("client_name", &self.client_name)
            .field("redirect_uris", &self.redirect_uris)
            .field("grant_types", &self.grant_types)
            .field("token_endpoint_auth_method", &self.token_endpoint_auth_method)
            .field("scope", &self.scope)
            .finish()
    }
}
