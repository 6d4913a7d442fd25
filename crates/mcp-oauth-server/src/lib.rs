//! MCP OAuth Server
//!
//! A Model Context Protocol (MCP) server whose tool endpoint is protected by an
//! embedded OAuth 2.0 authorization server. End-user login is delegated to an
//! upstream identity provider (GitHub, GitLab or Gitea).
//!
//! # Features
//!
//! - **Authorization code grant with PKCE** (plain and S256)
//! - **Dynamic client registration** (RFC 7591)
//! - **Pluggable credential store**: in-memory, or Redis with a short-lived local read cache
//! - **Two MCP tools**: `show_auth_token`, `list_clients`
//!
//! # Example
//!
//! ```no_run
//! use mcp_oauth_server::config::Config;
//! use mcp_oauth_server::provider::{ProviderKind, create_provider};
//! use mcp_oauth_server::server::McpServer;
//! use mcp_oauth_server::server::oauth::{AuthorizationServer, open_store};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new("https://mcp.example.com", ProviderKind::Github, "id", "secret");
//!     let store = open_store(&config).await?;
//!     let provider = create_provider(&config)?;
//!
//!     let server = McpServer::new(AuthorizationServer::new(store, provider, &config));
//!     server.run_http(8000).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod provider;
pub mod server;
pub mod tools;

pub use config::Config;
pub use error::{OAuthError, ProviderError, StoreError, ToolError};
