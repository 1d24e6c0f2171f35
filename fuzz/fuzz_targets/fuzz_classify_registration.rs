//! Fuzz target for registration classification and char truncation.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ma_common::truncate_chars;
use ma_core::orchestrate::{classify_registration, RegistrationOutcome};

#[derive(Debug, Arbitrary)]
struct Input {
    succeeded: bool,
    output: String,
    limit: u8,
}

fuzz_target!(|input: Input| {
    let outcome = classify_registration(input.succeeded, &input.output);
    if input.succeeded {
        assert_eq!(outcome, RegistrationOutcome::Registered);
    }

    let cut = truncate_chars(&input.output, input.limit as usize);
    assert!(cut.chars().count() <= input.limit as usize);
    assert!(input.output.starts_with(cut));
});
