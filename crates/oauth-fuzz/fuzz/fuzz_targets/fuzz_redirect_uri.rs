#![no_main]

use libfuzzer_sys::fuzz_target;
use mcp_oauth_server::server::oauth::pkce::{is_registrable_redirect_uri, validate_redirect_uri};

fuzz_target!(|data: &[u8]| {
    let Ok(candidate) = std::str::from_utf8(data) else {
        return;
    };
    let allow = vec!["https://app.example/cb".to_string(), "http://localhost:9999/".to_string()];

    // Anything accepted against the allow-list must itself be registrable
    if validate_redirect_uri(candidate, &allow) {
        assert!(is_registrable_redirect_uri(candidate));
    }
});
