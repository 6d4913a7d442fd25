#![no_main]

use libfuzzer_sys::fuzz_target;
use mcp_oauth_server::server::oauth::TokenRequest;

fuzz_target!(|data: &[u8]| {
    // Try to parse arbitrary bytes as a token request form
    let _ = serde_urlencoded::from_bytes::<TokenRequest>(data);
});
