//! Proof programs that settle an action backlog into a Merkle map.
//!
//! This crate ties together:
//! - The stack-reversal program (`StackProgram`): turns a forward action
//!   chain into a pop-oldest-first stack, in fixed-size recursive chunks.
//! - The Merkle-update fold (`RollupProgram`): applies checkpoint-tagged
//!   actions to a witnessed map and advances `(root, length, action_state)`.
//! - Out-of-circuit twins (`apply_actions`, `rebuild_merkle_map`) that
//!   reproduce the settled map without proving.
//!
//! Both programs run out of circuit here; statements are bound through the
//! attestation seam in `alr-core` so a real recursive backend can be
//! slotted in without changing call sites.

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

/// Out-of-circuit application of actions to a map.
pub mod apply;
/// The batched Merkle-update folding program.
pub mod rollup;
/// The stack-reversal program and witness fetching.
pub mod stack;

pub use crate::apply::{apply_actions, empty_commitments, rebuild_merkle_map};
pub use crate::rollup::{merkle_update_batch, RollupParams, RollupProgram, RollupProof};
pub use crate::stack::{
    action_stack_chunk, fetch_action_witnesses, ActionStackState, ActionWitness, FetchedWitnesses,
    PartialStackProof, StackProgram, StackProof,
};
