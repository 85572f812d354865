//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary byte sequences through `AppConfig::parse()` to find
//! panics or hangs in the TOML parsing and validation pipeline.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Any outcome is fine as long as parse and validate never panic.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = twinwire_config::AppConfig::parse(s);
    }
});
