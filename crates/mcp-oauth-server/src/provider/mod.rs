//! Upstream identity providers.
//!
//! The authorization server delegates end-user login to one upstream OAuth
//! provider, chosen once at startup:
//! - GitHub (`github.com` / GitHub Enterprise)
//! - GitLab (`gitlab.com` / self-hosted)
//! - Gitea (self-hosted)
//!
//! All calls go through a `reqwest` client with fixed request and connect
//! timeouts. Nothing is retried.

mod gitea;
mod github;
mod gitlab;

pub use gitea::GiteaProvider;
pub use github::GithubProvider;
pub use gitlab::GitlabProvider;

use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::Config;
use crate::error::{ProviderError, ProviderResult};
use crate::server::oauth::types::now_unix;

/// Upstream identity provider vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ProviderKind {
    #[default]
    Github,
    Gitlab,
    Gitea,
}

/// Parameters for the upstream authorize redirect.
#[derive(Debug, Clone, Default)]
pub struct AuthorizeParams<'a> {
    pub client_id: &'a str,
    pub state: Option<&'a str>,
    pub redirect_uri: &'a str,
    pub scope: &'a [String],
    pub code_challenge: Option<&'a str>,
    pub code_challenge_method: Option<&'a str>,
}

/// Parameters for the upstream code exchange.
#[derive(Debug, Clone)]
pub struct ExchangeParams<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub code: &'a str,
    pub redirect_uri: &'a str,
    pub code_verifier: Option<&'a str>,
}

/// Token issued by the upstream provider, passed through to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Absolute expiry in unix seconds, derived from `expires_in`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

/// Authenticated end user, used only for audit logging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub email: Option<String>,
    pub name: Option<String>,
    pub login: Option<String>,
    pub avatar_url: Option<String>,
}

/// An upstream OAuth 2.0 identity provider.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &'static str;

    /// Build the URL the user agent is redirected to for login.
    fn authorize_url(&self, params: &AuthorizeParams<'_>) -> ProviderResult<String>;

    /// Exchange an upstream authorization code for a token.
    async fn exchange_token(&self, params: &ExchangeParams<'_>) -> ProviderResult<Token>;

    /// Fetch the profile of the token's owner.
    async fn fetch_user_info(&self, access_token: &str) -> ProviderResult<UserInfo>;
}

/// Build the provider selected by `config.provider`.
pub fn create_provider(config: &Config) -> ProviderResult<Arc<dyn IdentityProvider>> {
    let http = build_http_client(config)?;
    let provider: Arc<dyn IdentityProvider> = match config.provider {
        ProviderKind::Github => Arc::new(GithubProvider::new(
            http,
            config.provider_base_url.as_deref(),
            config.provider_api_url.as_deref(),
        )?),
        ProviderKind::Gitlab => Arc::new(GitlabProvider::new(
            http,
            config.provider_base_url.as_deref(),
            config.provider_api_url.as_deref(),
        )?),
        ProviderKind::Gitea => Arc::new(GiteaProvider::new(
            http,
            config.provider_base_url.as_deref(),
            config.provider_api_url.as_deref(),
        )?),
    };
    tracing::info!(provider = provider.name(), "Configured upstream identity provider");
    Ok(provider)
}

/// HTTP client for provider calls, with fixed timeouts.
pub fn build_http_client(config: &Config) -> ProviderResult<Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );

    let client = Client::builder()
        .default_headers(headers)
        .user_agent(concat!("mcp-oauth-server/", env!("CARGO_PKG_VERSION")))
        .timeout(config.upstream_timeout)
        .connect_timeout(config.connect_timeout)
        .build()?;
    Ok(client)
}

/// Endpoints shared by the three vendors' OAuth flows.
#[derive(Debug, Clone)]
pub(crate) struct Endpoints {
    pub authorize: Url,
    pub token: Url,
    pub user: Url,
}

impl Endpoints {
    pub fn resolve(base: &str, api: &str, authorize: &str, token: &str, user: &str) -> ProviderResult<Self> {
        let base = with_trailing_slash(base)?;
        let api = with_trailing_slash(api)?;
        Ok(Self {
            authorize: base.join(authorize)?,
            token: base.join(token)?,
            user: api.join(user)?,
        })
    }

    /// Authorize URL with the standard query parameters.
    pub fn authorize_url(&self, params: &AuthorizeParams<'_>) -> String {
        let mut url = self.authorize.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", params.client_id)
                .append_pair("redirect_uri", params.redirect_uri)
                .append_pair("response_type", "code");
            if !params.scope.is_empty() {
                query.append_pair("scope", &params.scope.join(" "));
            }
            if let Some(state) = params.state {
                query.append_pair("state", state);
            }
            if let Some(challenge) = params.code_challenge {
                query.append_pair("code_challenge", challenge);
                query.append_pair("code_challenge_method", params.code_challenge_method.unwrap_or("plain"));
            }
        }
        url.to_string()
    }
}

fn with_trailing_slash(raw: &str) -> ProviderResult<Url> {
    if raw.ends_with('/') {
        Ok(Url::parse(raw)?)
    } else {
        Ok(Url::parse(&format!("{raw}/"))?)
    }
}

/// Raw token endpoint response. GitHub answers 200 with `error` on failure.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Standard form-encoded authorization code exchange.
pub(crate) async fn exchange_code(
    http: &Client,
    token_url: &Url,
    params: &ExchangeParams<'_>,
) -> ProviderResult<Token> {
    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("client_id", params.client_id),
        ("client_secret", params.client_secret),
        ("code", params.code),
        ("redirect_uri", params.redirect_uri),
    ];
    if let Some(verifier) = params.code_verifier {
        form.push(("code_verifier", verifier));
    }

    let response = http.post(token_url.clone()).form(&form).send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ProviderError::Status { status: status.as_u16(), message: body });
    }

    let raw: TokenResponse = serde_json::from_str(&body)?;
    let Some(access_token) = raw.access_token.filter(|t| !t.is_empty()) else {
        let reason = match (raw.error, raw.error_description) {
            (Some(error), Some(description)) => format!("{error}: {description}"),
            (Some(error), None) => error,
            _ => "empty token response".to_string(),
        };
        return Err(ProviderError::MissingToken(reason));
    };

    Ok(Token {
        access_token,
        token_type: raw.token_type.unwrap_or_else(|| "bearer".to_string()),
        expires_in: raw.expires_in,
        refresh_token: raw.refresh_token.filter(|t| !t.is_empty()),
        scope: raw.scope.filter(|s| !s.is_empty()),
        expires_at: raw.expires_in.map(|secs| now_unix() + secs),
    })
}

/// GET a JSON document with a bearer token.
pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
    http: &Client,
    url: &Url,
    access_token: &str,
) -> ProviderResult<T> {
    let response = http.get(url.clone()).bearer_auth(access_token).send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ProviderError::Status { status: status.as_u16(), message: body });
    }
    Ok(serde_json::from_str(&body)?)
}
