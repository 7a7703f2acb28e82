// crates/alr-list/src/lib.rs

//! Hash-chained lists with a commitment/witness split.
//!
//! An [`AuthenticatedList`] is a pair of (a) a single field-sized `hash`
//! committing to the whole list and (b) a prover-only witness of the pushed
//! elements. Only the hash takes part in equality and serialization; the
//! witness exists so pops and iteration can re-derive every link and fail
//! loudly on any desync. [`ListIterator`] replays the chain forward in a
//! fixed number of steps, padding with dummies past the logical end.

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

mod iter;
mod list;

pub use iter::ListIterator;
pub use list::{AuthenticatedList, LinkHash, WithHash};
