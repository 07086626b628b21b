//! Fuzz target for split classification.
//!
//! Arbitrary file names must classify without panicking, and the result must
//! agree with the pattern match.

#![no_main]

use bagseg::index::{EvalPattern, Split};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(file_name) = std::str::from_utf8(data) else {
        return;
    };

    let pattern = EvalPattern::default();
    let split = Split::classify(file_name, &pattern);
    assert_eq!(split == Split::Eval, pattern.is_match(file_name));
});
