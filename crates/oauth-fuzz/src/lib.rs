//! Fuzzing library for mcp-oauth-server.
//!
//! Targets cover the inputs an unauthenticated caller controls: redirect URIs,
//! registration bodies and token request forms.
//!
//! # Usage
//!
//! ```bash
//! cd crates/oauth-fuzz
//! cargo +nightly fuzz run fuzz_redirect_uri -- -max_total_time=60
//! ```

pub use mcp_oauth_server::server::oauth::{RegisterRequest, TokenRequest, pkce};
