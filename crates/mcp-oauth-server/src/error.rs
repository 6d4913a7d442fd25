//! Error types for the MCP OAuth server.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! Each layer has its own enum; [`OAuthError`] is the endpoint-facing taxonomy that
//! knows how to render itself as an HTTP response.

use axum::{
    Json,
    extract::rejection::{FormRejection, JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Errors from a [`CredentialStore`](crate::server::oauth::store::CredentialStore).
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Missing or malformed input (empty id, empty redirect URI list).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Record absent or expired.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authorization code already expired when it was written.
    #[error("Authorization code already expired")]
    Expired,

    /// Backing store could not be reached or answered with a protocol error.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Wrap a backend failure.
    #[must_use]
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::BackendUnavailable(Box::new(err))
    }

    /// Returns true if the record was simply absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::backend(err)
    }
}

/// Errors from PKCE helpers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PkceError {
    /// Challenge method other than `plain` or `S256`.
    #[error("Unsupported code challenge method: {0}")]
    UnsupportedMethod(String),
}

/// Errors from upstream identity provider calls.
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    /// HTTP transport error (connection, DNS, TLS, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("Provider returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },

    /// Response body could not be parsed
    #[error("Failed to parse provider response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Provider answered 200 but without an access token (GitHub reports errors this way)
    #[error("Provider did not return an access token: {0}")]
    MissingToken(String),

    /// Provider base URL could not be joined with an endpoint path
    #[error("Invalid provider URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Endpoint-level errors, mapped to HTTP status and an OAuth `error` code.
#[derive(thiserror::Error, Debug)]
pub enum OAuthError {
    /// Malformed or missing request input.
    #[error("{description}")]
    InvalidArgument {
        /// OAuth error code (e.g. `invalid_request`)
        code: &'static str,
        /// Human-readable description
        description: String,
    },

    /// Client or authorization code absent.
    #[error("{description}")]
    NotFound {
        /// OAuth error code
        code: &'static str,
        /// Human-readable description
        description: String,
    },

    /// Authorization code expired.
    #[error("Authorization code expired")]
    Expired,

    /// Unknown PKCE method.
    #[error(transparent)]
    UnsupportedMethod(#[from] PkceError),

    /// Secret mismatch, PKCE mismatch, or redirect URI not allow-listed.
    #[error("{description}")]
    Forbidden {
        /// OAuth error code
        code: &'static str,
        /// Human-readable description
        description: String,
    },

    /// Storage I/O failure.
    #[error("Credential store unavailable: {0}")]
    BackendUnavailable(#[source] StoreError),

    /// Identity provider call failed.
    #[error("Upstream identity provider failed: {0}")]
    UpstreamFailure(#[from] ProviderError),
}

impl OAuthError {
    /// Create an `invalid_request` error.
    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::InvalidArgument { code: "invalid_request", description: description.into() }
    }

    /// Create an invalid argument error with a specific OAuth code.
    #[must_use]
    pub fn invalid(code: &'static str, description: impl Into<String>) -> Self {
        Self::InvalidArgument { code, description: description.into() }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(code: &'static str, description: impl Into<String>) -> Self {
        Self::NotFound { code, description: description.into() }
    }

    /// Create a forbidden error.
    #[must_use]
    pub fn forbidden(code: &'static str, description: impl Into<String>) -> Self {
        Self::Forbidden { code, description: description.into() }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument { .. }
            | Self::NotFound { .. }
            | Self::Expired
            | Self::UnsupportedMethod(_)
            | Self::Forbidden { .. } => StatusCode::BAD_REQUEST,
            Self::BackendUnavailable(_) | Self::UpstreamFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable OAuth `error` value.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { code, .. }
            | Self::NotFound { code, .. }
            | Self::Forbidden { code, .. } => *code,
            Self::Expired => "invalid_grant",
            Self::UnsupportedMethod(_) => "invalid_request",
            Self::BackendUnavailable(_) => "server_error",
            Self::UpstreamFailure(_) => "upstream_error",
        }
    }

    /// Description safe to show to the client.
    ///
    /// Backend errors are reduced to a generic category.
    #[must_use]
    pub fn public_description(&self) -> String {
        match self {
            Self::BackendUnavailable(_) => "credential store unavailable".to_string(),
            Self::UpstreamFailure(_) => "identity provider request failed".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for OAuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidArgument(message) => Self::invalid_request(message),
            StoreError::NotFound(what) => Self::not_found("invalid_grant", what),
            StoreError::Expired => Self::Expired,
            other => Self::BackendUnavailable(other),
        }
    }
}

impl From<JsonRejection> for OAuthError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_request(rejection.body_text())
    }
}

impl From<QueryRejection> for OAuthError {
    fn from(rejection: QueryRejection) -> Self {
        Self::invalid_request(rejection.body_text())
    }
}

impl From<FormRejection> for OAuthError {
    fn from(rejection: FormRejection) -> Self {
        Self::invalid_request(rejection.body_text())
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = serde_json::json!({
            "error": self.error_code(),
            "error_description": self.public_description(),
        });

        match &self {
            Self::UpstreamFailure(err) => {
                tracing::error!(error = %err, "Upstream identity provider call failed");
                body["details"] = serde_json::Value::String(err.to_string());
            }
            Self::BackendUnavailable(err) => {
                tracing::error!(error = %err, "Credential store call failed");
            }
            _ => {
                tracing::debug!(error = self.error_code(), description = %self, "Rejected OAuth request");
            }
        }

        (status, Json(body)).into_response()
    }
}

/// Errors from MCP tool execution.
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    /// Input validation failed
    #[error("Validation error: {message}")]
    Validation {
        /// Field that failed validation
        field: String,
        /// Validation error message
        message: String,
    },

    /// Credential store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Tool requires a bearer token that the request did not carry
    #[error("No bearer token on this request")]
    Unauthenticated,
}

impl ToolError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    /// Convert to a user-friendly error message for MCP response.
    #[must_use]
    pub fn to_user_message(&self) -> String {
        match self {
            Self::Validation { field, message } => {
                format!("Invalid input for '{field}': {message}")
            }
            Self::Store(StoreError::BackendUnavailable(_)) => {
                "Credential store is unavailable, try again later.".to_string()
            }
            Self::Unauthenticated => {
                "This tool needs an authenticated request (Authorization: Bearer ...).".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;
