//! PKCE (Proof Key for Code Exchange) helpers and redirect URI validation.
//!
//! Implements the `plain` and `S256` transforms per RFC 7636.

use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use url::Url;

use crate::error::PkceError;

/// RFC 7636 §4.1 unreserved characters.
const UNRESERVED: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Length of a generated code verifier.
pub const VERIFIER_LEN: usize = 64;

/// Length of a generated state value.
pub const STATE_LEN: usize = 32;

/// Supported code challenge transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeMethod {
    Plain,
    S256,
}

impl ChallengeMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }
}

impl FromStr for ChallengeMethod {
    type Err = PkceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "S256" => Ok(Self::S256),
            other => Err(PkceError::UnsupportedMethod(other.to_string())),
        }
    }
}

fn random_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| UNRESERVED[rng.gen_range(0..UNRESERVED.len())] as char)
        .collect()
}

/// Generate a 64-character code verifier.
#[must_use]
pub fn generate_code_verifier() -> String {
    random_string(VERIFIER_LEN)
}

/// Generate a 32-character anti-CSRF state value.
#[must_use]
pub fn generate_state() -> String {
    random_string(STATE_LEN)
}

/// Generate an opaque token using two UUIDs (256 bits).
#[must_use]
pub fn generate_token() -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
}

/// Compute `BASE64URL(SHA256(code_verifier))` without padding.
#[must_use]
pub fn generate_code_challenge(code_verifier: &str) -> String {
    let hash = Sha256::digest(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Compute the challenge for `code_verifier` under `method`.
pub fn compute_challenge(code_verifier: &str, method: &str) -> Result<String, PkceError> {
    match method.parse::<ChallengeMethod>()? {
        ChallengeMethod::Plain => Ok(code_verifier.to_string()),
        ChallengeMethod::S256 => Ok(generate_code_challenge(code_verifier)),
    }
}

/// Verify a code verifier against a stored challenge in constant time.
pub fn verify(code_verifier: &str, code_challenge: &str, method: &str) -> Result<bool, PkceError> {
    let computed = compute_challenge(code_verifier, method)?;
    Ok(computed.as_bytes().ct_eq(code_challenge.as_bytes()).into())
}

/// Check a redirect URI against a client's allow-list.
///
/// The candidate must be absolute, carry no fragment or userinfo, and match an
/// allow-listed entry on scheme, host and port. Its path must equal the allowed
/// path or extend it by whole segments.
#[must_use]
pub fn validate_redirect_uri(candidate: &str, allow_list: &[String]) -> bool {
    let Some(candidate) = parse_redirect_uri(candidate) else {
        return false;
    };

    allow_list.iter().filter_map(|allowed| Url::parse(allowed).ok()).any(|allowed| {
        allowed.scheme() == candidate.scheme()
            && allowed.host_str() == candidate.host_str()
            && allowed.port_or_known_default() == candidate.port_or_known_default()
            && path_extends(candidate.path(), allowed.path())
    })
}

/// Whether `uri` may be registered as a redirect URI.
#[must_use]
pub fn is_registrable_redirect_uri(uri: &str) -> bool {
    parse_redirect_uri(uri).is_some()
}

fn parse_redirect_uri(raw: &str) -> Option<Url> {
    let url = Url::parse(raw).ok()?;
    let acceptable = !url.cannot_be_a_base()
        && url.host_str().is_some()
        && url.fragment().is_none()
        && url.username().is_empty()
        && url.password().is_none();
    acceptable.then_some(url)
}

fn path_extends(path: &str, prefix: &str) -> bool {
    if path == prefix {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => prefix.ends_with('/') || rest.starts_with('/'),
        None => false,
    }
}
