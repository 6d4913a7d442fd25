//! GitHub OAuth app provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{AuthorizeParams, Endpoints, ExchangeParams, IdentityProvider, Token, UserInfo};
use crate::error::ProviderResult;

const DEFAULT_BASE_URL: &str = "https://github.com";
const DEFAULT_API_URL: &str = "https://api.github.com";

/// GitHub (or GitHub Enterprise when the base URL is overridden).
#[derive(Debug, Clone)]
pub struct GithubProvider {
    http: Client,
    endpoints: Endpoints,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: Option<String>,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

impl GithubProvider {
    /// Enterprise servers expose the REST API under `<base>/api/v3`.
    pub fn new(http: Client, base_url: Option<&str>, api_url: Option<&str>) -> ProviderResult<Self> {
        let base = base_url.unwrap_or(DEFAULT_BASE_URL);
        let api = match (api_url, base_url) {
            (Some(api), _) => api.to_string(),
            (None, Some(base)) => format!("{}/api/v3", base.trim_end_matches('/')),
            (None, None) => DEFAULT_API_URL.to_string(),
        };
        let endpoints =
            Endpoints::resolve(base, &api, "login/oauth/authorize", "login/oauth/access_token", "user")?;
        Ok(Self { http, endpoints })
    }
}

#[async_trait]
impl IdentityProvider for GithubProvider {
    fn name(&self) -> &'static str {
        "github"
    }

    fn authorize_url(&self, params: &AuthorizeParams<'_>) -> ProviderResult<String> {
        Ok(self.endpoints.authorize_url(params))
    }

    async fn exchange_token(&self, params: &ExchangeParams<'_>) -> ProviderResult<Token> {
        super::exchange_code(&self.http, &self.endpoints.token, params).await
    }

    async fn fetch_user_info(&self, access_token: &str) -> ProviderResult<UserInfo> {
        let user: GithubUser = super::get_json(&self.http, &self.endpoints.user, access_token).await?;
        Ok(UserInfo {
            email: user.email,
            name: user.name,
            login: user.login,
            avatar_url: user.avatar_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let provider = GithubProvider::new(Client::new(), None, None).unwrap();
        assert_eq!(provider.endpoints.authorize.as_str(), "https://github.com/login/oauth/authorize");
        assert_eq!(provider.endpoints.token.as_str(), "https://github.com/login/oauth/access_token");
        assert_eq!(provider.endpoints.user.as_str(), "https://api.github.com/user");
    }

    #[test]
    fn test_enterprise_endpoints() {
        let provider = GithubProvider::new(Client::new(), Some("https://ghe.example.com"), None).unwrap();
        assert_eq!(provider.endpoints.user.as_str(), "https://ghe.example.com/api/v3/user");
    }
}
