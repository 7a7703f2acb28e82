// crates/alr-crypto/src/lib.rs

//! Crypto substrate for the action-log rollup: field-sized values, prefixed
//! hashing, and a Blake3 transcript.
//!
//! ⚠️ **Security note:** the transcript models a domain-separated random
//! oracle over Blake3 and stands in for a real proof system's hash gadget.
//! The *derivations* (per-event hash, sequence-state chain) are pinned wire
//! format; the oracle itself is scaffolding.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]

mod field;
mod hash;
mod transcript;

pub use field::Field;
pub use hash::{
    empty_action_state, empty_batch, empty_with_prefix, event_hash, hash_with_prefix, prefix,
    push_event, update_sequence_state,
};
pub use transcript::{Blake3Transcript, Transcript};
