//! Fuzz target for config.toml parsing.
//!
//! Parsing and validation must return an error on bad input, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ma_core::config::parse_config;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = parse_config(text);
    }
});
