//! Configuration for the MCP OAuth server.

use std::time::Duration;

use crate::provider::ProviderKind;
use crate::server::oauth::store::StoreKind;

/// OAuth configuration constants.
pub mod oauth {
    use std::time::Duration;

    /// Authorization code lifetime (10 minutes).
    pub const AUTH_CODE_LIFETIME: Duration = Duration::from_secs(600);

    /// Client-side cache window for authorization codes.
    ///
    /// Kept small relative to the code lifetime because codes churn quickly.
    pub const CODE_CACHE_TTL: Duration = Duration::from_secs(10);

    /// Client-side cache window for registered clients.
    pub const CLIENT_CACHE_TTL: Duration = Duration::from_secs(60);

    /// How long a bearer token verified against the provider stays trusted.
    pub const TOKEN_CACHE_TTL: Duration = Duration::from_secs(60);

    /// Maximum entries per client-side cache.
    pub const CACHE_MAX_SIZE: u64 = 10_000;

    /// Upper bound for a single remote store round trip.
    pub const STORE_OP_TIMEOUT: Duration = Duration::from_secs(5);

    /// Request timeout for upstream identity provider calls.
    pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection timeout for upstream identity provider calls.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default scope for newly registered clients.
    pub const DEFAULT_SCOPE: &str = "openid profile email";

    /// Default grant types for newly registered clients.
    pub const DEFAULT_GRANT_TYPES: &[&str] = &["authorization_code", "refresh_token"];

    /// Default response types for newly registered clients.
    pub const DEFAULT_RESPONSE_TYPES: &[&str] = &["code"];

    /// Default token endpoint authentication method.
    pub const DEFAULT_AUTH_METHOD: &str = "client_secret_post";

    /// Scopes advertised in the metadata documents.
    pub const SCOPES_SUPPORTED: &[&str] = &["openid", "profile", "email"];

    /// PKCE methods accepted at `/authorize`.
    pub const CODE_CHALLENGE_METHODS: &[&str] = &["plain", "S256"];

    /// Token endpoint authentication methods accepted at `/token`.
    pub const AUTH_METHODS_SUPPORTED: &[&str] = &["client_secret_post", "none"];
}

/// Server configuration.
#[derive(Clone)]
pub struct Config {
    /// Public base URL of this server (issuer and endpoint prefix).
    pub base_url: String,

    /// Upstream identity provider.
    pub provider: ProviderKind,

    /// Override for the provider's web base URL (self-hosted GitLab/Gitea, mock servers).
    pub provider_base_url: Option<String>,

    /// Override for the provider's API base URL.
    pub provider_api_url: Option<String>,

    /// Client id of this server's OAuth app at the upstream provider.
    pub upstream_client_id: String,

    /// Client secret of this server's OAuth app at the upstream provider.
    pub upstream_client_secret: String,

    /// Credential store backend.
    pub store: StoreKind,

    /// Redis connection URL (only used with the Redis store).
    pub redis_url: String,

    /// Upstream request timeout.
    pub upstream_timeout: Duration,

    /// Upstream connection timeout.
    pub connect_timeout: Duration,

    /// Authorization code lifetime.
    pub auth_code_lifetime: Duration,

    /// Client-side cache window for codes.
    pub code_cache_ttl: Duration,

    /// Client-side cache window for clients.
    pub client_cache_ttl: Duration,

    /// Bound on a single remote store round trip.
    pub store_op_timeout: Duration,

    /// Maximum entries per client-side cache.
    pub cache_max_size: u64,
}

impl Config {
    /// Create a configuration for the given provider and upstream OAuth app.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        provider: ProviderKind,
        upstream_client_id: impl Into<String>,
        upstream_client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            provider,
            provider_base_url: None,
            provider_api_url: None,
            upstream_client_id: upstream_client_id.into(),
            upstream_client_secret: upstream_client_secret.into(),
            store: StoreKind::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            upstream_timeout: oauth::UPSTREAM_TIMEOUT,
            connect_timeout: oauth::CONNECT_TIMEOUT,
            auth_code_lifetime: oauth::AUTH_CODE_LIFETIME,
            code_cache_ttl: oauth::CODE_CACHE_TTL,
            client_cache_ttl: oauth::CLIENT_CACHE_TTL,
            store_op_timeout: oauth::STORE_OP_TIMEOUT,
            cache_max_size: oauth::CACHE_MAX_SIZE,
        }
    }

    /// Create a test configuration pointing every provider URL at a mock server.
    #[must_use]
    pub fn for_testing(provider_url: &str) -> Self {
        let mut config = Self::new(
            "https://auth.example.com",
            ProviderKind::Github,
            "upstream-client",
            "upstream-secret",
        );
        config.provider_base_url = Some(provider_url.to_string());
        config.provider_api_url = Some(provider_url.to_string());
        config.upstream_timeout = Duration::from_secs(5);
        config.connect_timeout = Duration::from_secs(2);
        config
    }

    /// Use a different credential store backend.
    #[must_use]
    pub fn with_store(mut self, store: StoreKind) -> Self {
        self.store = store;
        self
    }

    /// Use a specific Redis URL.
    #[must_use]
    pub fn with_redis_url(mut self, redis_url: impl Into<String>) -> Self {
        self.redis_url = redis_url.into();
        self
    }

    /// Authorization server metadata URL.
    #[must_use]
    pub fn auth_server_metadata_url(&self) -> String {
        format!("{}/.well-known/oauth-authorization-server", self.base_url)
    }

    /// Protected resource metadata URL.
    #[must_use]
    pub fn protected_resource_metadata_url(&self) -> String {
        format!("{}/.well-known/oauth-protected-resource", self.base_url)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("provider", &self.provider)
            .field("provider_base_url", &self.provider_base_url)
            .field("upstream_client_id", &self.upstream_client_id)
            .field("store", &self.store)
            .field("redis_url", &crate::server::oauth::store::redact_url(&self.redis_url))
            .finish()
    }
}
