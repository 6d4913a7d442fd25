#![no_main]

use libfuzzer_sys::fuzz_target;
use mcp_oauth_server::server::oauth::RegisterRequest;

fuzz_target!(|data: &[u8]| {
    // Try to parse arbitrary bytes as a registration body
    let _ = serde_json::from_slice::<RegisterRequest>(data);
});
