//! OAuth 2.0 authorization server for MCP authentication.
//!
//! Login is delegated to an upstream identity provider. This server keeps the
//! pending authorization codes and the dynamically registered clients in a
//! [`CredentialStore`](store::CredentialStore), either in process or in Redis.
//!
//! ## Supported Standards
//! - RFC 9728: OAuth Protected Resource Metadata
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (plain, S256)
//! - RFC 6749: Authorization Code Grant

pub mod authorization;
pub mod handlers;
pub mod pkce;
pub mod store;
pub mod types;

pub use authorization::{
    AuthorizationServer, AuthorizeRequest, RegisterRequest, RegistrationResponse, TokenRequest,
};
pub use store::{CredentialStore, StoreKind, open_store};
pub use types::{AuthorizationCode, Client};
