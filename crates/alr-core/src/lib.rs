//! alr-core — canonical types for the action-log rollup.
//!
//! This crate defines the **stable boundary** used across ALR crates:
//! - actions and their pinned two-level hash chains (`ActionList`,
//!   `ActionChain`),
//! - on-chain-visible commitments (`StateCommitments`),
//! - linearized (checkpoint-tagged) action sequences,
//! - the recursive-proof seam (`Proof`, `VerificationKey`, `PublicIo`), and
//! - the action-source boundary with an in-memory implementation.
//!
//! ```no_run
//! use alr_core::{Action, ActionChain, ActionList};
//! use alr_crypto::empty_action_state;
//!
//! let mut chain = ActionChain::empty_at(empty_action_state());
//! chain.push(ActionList::from_elements([Action::set(1u64.into(), 5u64.into())]));
//! let action_state = chain.hash();
//! # let _ = action_state;
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Small, explicit allowlist to keep docs readable and APIs ergonomic.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]

/// Actions, per-batch folds, and the two-level action-state chain.
pub mod action;
/// On-chain-visible `(root, length, action_state)` commitments.
pub mod commit;
/// Seeded synthetic backlogs for demos and benchmarks.
pub mod generator;
/// Checkpoint-tagged flattening of the two-level chain.
pub mod linearize;
/// Proof handles, verification keys, and the attestation transcript.
pub mod proof;
/// Action-source boundary and the in-memory ledger used by tests/tools.
pub mod source;

// ---- Re-exports for workspace compatibility ----
pub use action::*;
pub use commit::*;
pub use linearize::*;
pub use proof::*;
pub use source::*;
// (`generator` stays behind its module path; it is tooling, not format.)

/// Commonly-used items for quick imports.
///
/// ```rust
/// use alr_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::action::{Action, ActionChain, ActionList, ChainIterator, StackHashes};
    pub use crate::commit::StateCommitments;
    pub use crate::linearize::{linearize, LinearizedAction, LinearizedList};
    pub use crate::proof::{Proof, PublicIo, VerificationKey};
    pub use crate::source::{AccountId, ActionSource, MemorySource, TokenId};
}
