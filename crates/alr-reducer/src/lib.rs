//! Batch orchestration over an action backlog.
//!
//! A contract cannot process an unbounded backlog in one transaction. The
//! reducer splits settlement in two phases:
//! - [`BatchReducer::prepare_batches`] (planning, off chain): fetch
//!   everything pending, prove one stack reversal over all but a short
//!   tail, and partition the reversed stack into per-transaction batches
//!   with the hints each transaction needs.
//! - [`BatchReducer::process_batch`] (per transaction): check the on-chain
//!   cells are not stale, rebuild or trust the stack, pop up to
//!   `batch_size` actions taking whole updates atomically, hand each slot
//!   to the caller's callback, and commit the advanced cells.
//!
//! Staleness anywhere fails the transaction before any state is written;
//! recovery is a fresh `prepare_batches` run.

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

/// On-chain cells owned by the reducer.
pub mod cells;
/// Planning and per-transaction processing.
pub mod reducer;

pub use crate::cells::ReducerCells;
pub use crate::reducer::{ActionStackHints, BatchReducer, PreparedBatch, ReducerParams};
