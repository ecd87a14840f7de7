//! Fuzz target for the channel message codec
//!
//! Peers send arbitrary text. Decoding must never panic, and anything that
//! decodes to a known command must survive a re-encode unchanged.
//!
//! # Invariants
//!
//! - `decode` never panics; garbage becomes `Command::Unrecognized`
//! - `try_decode` fails exactly when `decode` falls back
//! - Known commands round-trip through `encode`

#![no_main]

use libfuzzer_sys::fuzz_target;
use roomsync_proto::{Command, decode, encode, try_decode};

fuzz_target!(|text: &str| {
    let command = decode(text);
    let strict = try_decode(text);

    if let Command::Unrecognized(raw) = &command {
        assert_eq!(raw, text);
        return;
    }
    assert!(strict.is_ok(), "decode accepted what try_decode rejected");

    let Ok(json) = encode(&command) else {
        panic!("decoded command failed to encode: {command:?}");
    };
    assert_eq!(decode(&json), command, "round trip changed {text}");
});
