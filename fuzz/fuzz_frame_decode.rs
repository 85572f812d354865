//! Fuzz target for the wire frame decoder.
//!
//! Run with: cargo +nightly fuzz run fuzz_frame_decode
//!
//! Runs arbitrary bytes through the full inbound path both daemon roles
//! use: frame deserialization, envelope decoding with header checks, and
//! self-echo screening. Malformed input must come back as a drop reason,
//! never as a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use twinwire_core::{dispatch, Role};

fuzz_target!(|data: &[u8]| {
    let _ = dispatch::classify(data, Role::User);
    let _ = dispatch::classify(data, Role::System);
});
