//! Gitea OAuth2 application provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{AuthorizeParams, Endpoints, ExchangeParams, IdentityProvider, Token, UserInfo};
use crate::error::ProviderResult;

const DEFAULT_BASE_URL: &str = "https://gitea.com";

#[derive(Debug, Clone)]
pub struct GiteaProvider {
    http: Client,
    endpoints: Endpoints,
}

#[derive(Debug, Deserialize)]
struct GiteaUser {
    login: Option<String>,
    full_name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

impl GiteaProvider {
    pub fn new(http: Client, base_url: Option<&str>, api_url: Option<&str>) -> ProviderResult<Self> {
        let base = base_url.unwrap_or(DEFAULT_BASE_URL);
        let api = api_url
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("{}/api/v1", base.trim_end_matches('/')));
        let endpoints =
            Endpoints::resolve(base, &api, "login/oauth/authorize", "login/oauth/access_token", "user")?;
        Ok(Self { http, endpoints })
    }
}

#[async_trait]
impl IdentityProvider for GiteaProvider {
    fn name(&self) -> &'static str {
        "gitea"
    }

    fn authorize_url(&self, params: &AuthorizeParams<'_>) -> ProviderResult<String> {
        Ok(self.endpoints.authorize_url(params))
    }

    async fn exchange_token(&self, params: &ExchangeParams<'_>) -> ProviderResult<Token> {
        super::exchange_code(&self.http, &self.endpoints.token, params).await
    }

    async fn fetch_user_info(&self, access_token: &str) -> ProviderResult<UserInfo> {
        let user: GiteaUser = super::get_json(&self.http, &self.endpoints.user, access_token).await?;
        Ok(UserInfo {
            email: user.email,
            // Gitea leaves full_name empty when unset
            name: user.full_name.filter(|n| !n.is_empty()),
            login: user.login,
            avatar_url: user.avatar_url,
        })
    }
}
