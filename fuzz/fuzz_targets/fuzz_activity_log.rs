//! Fuzz target for activity_log.json parsing.
//!
//! The log is shared with other tools, so its content is untrusted.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ma_common::ActivityEntry;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = serde_json::from_slice::<Vec<serde_json::Value>>(data) {
        for value in &raw {
            let entry = ActivityEntry::from_value(value);
            let _ = entry.detail_str("error");
        }
        let _ = serde_json::to_vec_pretty(&raw);
    }
});
