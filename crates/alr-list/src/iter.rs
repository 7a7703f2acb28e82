//! Forward replay over an authenticated list.
//!
//! A fixed number of `next()` calls must be able to cover a variable-length
//! list, so steps past the end return the dummy element with
//! `is_dummy == true` and leave the running hash parked at the terminal
//! value.

use std::fmt;
use std::marker::PhantomData;

use anyhow::{bail, ensure, Result};

use alr_crypto::Field;

use crate::list::{LinkHash, WithHash};

/// Replays a list's links front-to-back (push order).
///
/// Starts from the list's empty seed and must land exactly on the list's
/// final hash; [`assert_at_end`](Self::assert_at_end) enforces that no
/// element was silently skipped.
pub struct ListIterator<T, L> {
    /// Terminal commitment the replay must reach.
    hash: Field,
    empty_hash: Field,
    witness: Vec<WithHash<T>>,
    current_hash: Field,
    current_index: usize,
    _link: PhantomData<L>,
}

impl<T, L> ListIterator<T, L> {
    pub(crate) const fn over(hash: Field, empty_hash: Field, witness: Vec<WithHash<T>>) -> Self {
        Self {
            hash,
            empty_hash,
            witness,
            current_hash: empty_hash,
            current_index: 0,
            _link: PhantomData,
        }
    }

    /// Running hash after the links consumed so far.
    #[inline]
    #[must_use]
    pub const fn current_hash(&self) -> Field {
        self.current_hash
    }

    /// Terminal hash of the underlying list.
    #[inline]
    #[must_use]
    pub const fn hash(&self) -> Field {
        self.hash
    }

    /// Whether the replay has consumed every element.
    #[inline]
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.current_hash == self.hash
    }

    /// Hard failure if unconsumed elements remain.
    pub fn assert_at_end(&self, msg: &str) -> Result<()> {
        ensure!(self.is_at_end(), "{msg}");
        Ok(())
    }

    /// Prover-side peek at the next element without consuming it.
    ///
    /// Planning code uses this to size windows before committing to a step.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        if self.is_at_end() {
            return None;
        }
        self.witness.get(self.current_index).map(|w| &w.element)
    }
}

impl<T: Clone + Default, L: LinkHash<T>> ListIterator<T, L> {
    /// Step forward once.
    ///
    /// Past the logical end this returns `(dummy, true)` and the running
    /// hash stays parked at the terminal value. Fails only when the witness
    /// no longer matches the hash chain.
    pub fn next(&mut self) -> Result<(T, bool)> {
        if self.is_at_end() {
            return Ok((T::default(), true));
        }
        let Some(w) = self.witness.get(self.current_index) else {
            bail!(
                "iterator witness exhausted at {} before terminal {}",
                self.current_hash,
                self.hash
            );
        };
        ensure!(
            w.hash_before == self.current_hash,
            "iterator witness does not extend {} (expected {})",
            self.current_hash,
            w.hash_before
        );
        let element = w.element.clone();
        self.current_hash = L::link(&self.current_hash, &element);
        self.current_index += 1;
        Ok((element, false))
    }
}

impl<T: Clone, L> Clone for ListIterator<T, L> {
    fn clone(&self) -> Self {
        Self {
            hash: self.hash,
            empty_hash: self.empty_hash,
            witness: self.witness.clone(),
            current_hash: self.current_hash,
            current_index: self.current_index,
            _link: PhantomData,
        }
    }
}

impl<T, L> fmt::Debug for ListIterator<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListIterator")
            .field("current_hash", &self.current_hash)
            .field("hash", &self.hash)
            .field("index", &self.current_index)
            .finish_non_exhaustive()
    }
}
