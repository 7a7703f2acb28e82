//! The authenticated list: O(1) append, witness-checked conditional pop.

use std::fmt;
use std::marker::PhantomData;

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};

use alr_crypto::Field;

use crate::iter::ListIterator;

/// Link function and default empty seed for one list flavor.
///
/// Implementors are zero-sized markers; the pair (seed, link) fixes the wire
/// format of the resulting chain.
pub trait LinkHash<T> {
    /// Default seed of an empty list.
    fn empty() -> Field;
    /// Fold one element into the running hash.
    fn link(hash: &Field, element: &T) -> Field;
}

/// One witness entry: the element and the list hash before it was pushed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithHash<T> {
    /// List hash immediately before this element was appended.
    pub hash_before: Field,
    /// The appended element.
    pub element: T,
}

/// Hash-chained list with a prover-only witness.
///
/// `hash` is the only part a proof ever sees; `witness` lets the prover
/// re-open the chain link by link. The two never mix: equality and serde
/// cover the commitment fields only.
///
/// Lists must be [`clone`](Clone::clone)d before any code path that may
/// replay the same folding logic, since pops and iteration consume witness
/// state.
#[derive(Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct AuthenticatedList<T, L> {
    hash: Field,
    empty_hash: Field,
    #[serde(skip)]
    witness: Vec<WithHash<T>>,
    #[serde(skip)]
    _link: PhantomData<L>,
}

impl<T, L: LinkHash<T>> AuthenticatedList<T, L> {
    /// Empty list seeded at the flavor's default empty hash.
    #[must_use]
    pub fn new() -> Self {
        Self::empty_at(L::empty())
    }

    /// Build by pushing `elements` in iteration order.
    #[must_use]
    pub fn from_elements<I: IntoIterator<Item = T>>(elements: I) -> Self {
        let mut list = Self::new();
        for e in elements {
            list.push(e);
        }
        list
    }

    /// Build by pushing `elements` in *reverse* iteration order, so that
    /// popping yields them in iteration order again.
    #[must_use]
    pub fn from_reverse<I>(elements: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: DoubleEndedIterator,
    {
        let mut list = Self::new();
        for e in elements.into_iter().rev() {
            list.push(e);
        }
        list
    }
}

impl<T, L> AuthenticatedList<T, L> {
    /// Empty list seeded at a caller-supplied hash.
    ///
    /// The reversal protocol seeds stacks at the *current* chain head so the
    /// new links extend an existing commitment.
    #[must_use]
    pub const fn empty_at(seed: Field) -> Self {
        Self {
            hash: seed,
            empty_hash: seed,
            witness: Vec::new(),
            _link: PhantomData,
        }
    }

    /// Current chain commitment.
    #[inline]
    #[must_use]
    pub const fn hash(&self) -> Field {
        self.hash
    }

    /// The seed this list grows from.
    #[inline]
    #[must_use]
    pub const fn empty_hash(&self) -> Field {
        self.empty_hash
    }

    /// Whether the commitment equals the empty seed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hash == self.empty_hash
    }

    /// Number of witnessed elements (prover-side view).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.witness.len()
    }
}

impl<T, L: LinkHash<T>> AuthenticatedList<T, L> {
    /// Append an element. Never fails.
    pub fn push(&mut self, element: T) {
        let hash_before = self.hash;
        self.hash = L::link(&self.hash, &element);
        self.witness.push(WithHash { hash_before, element });
    }

    /// Append only when `cond` holds; otherwise leave the list untouched.
    pub fn push_if(&mut self, cond: bool, element: T) {
        if cond {
            self.push(element);
        }
    }
}

impl<T: Default, L: LinkHash<T>> AuthenticatedList<T, L> {
    /// Remove and return the most recently pushed element.
    ///
    /// On an empty list this is a no-op returning the dummy element, so a
    /// fixed number of pops can run past the logical end. Fails only if the
    /// witness tail no longer opens the commitment.
    pub fn pop(&mut self) -> Result<T> {
        if self.is_empty() {
            return Ok(T::default());
        }
        self.pop_if_unsafe(true)
    }

    /// Pop only when `cond` holds.
    ///
    /// With `cond == false` the list (hash *and* witness) is untouched and a
    /// dummy element is returned, letting a fixed-depth step consume a
    /// variable-length list. Unlike [`pop`](Self::pop), popping a truly
    /// empty list with `cond == true` is an error.
    pub fn pop_if_unsafe(&mut self, cond: bool) -> Result<T> {
        if !cond {
            return Ok(T::default());
        }
        let Some(w) = self.witness.pop() else {
            bail!("cannot pop: no witness for list at {}", self.hash);
        };
        let relinked = L::link(&w.hash_before, &w.element);
        ensure!(
            relinked == self.hash,
            "list witness does not open commitment: {} != {}",
            relinked,
            self.hash
        );
        self.hash = w.hash_before;
        Ok(w.element)
    }
}

impl<T: Clone, L: LinkHash<T>> AuthenticatedList<T, L> {
    /// Begin a forward replay of this list from its seed.
    ///
    /// The iterator takes its own copy of the witness; the list stays
    /// usable.
    #[must_use]
    pub fn start_iterating(&self) -> ListIterator<T, L> {
        ListIterator::over(self.hash, self.empty_hash, self.witness.clone())
    }

    /// Run `f` exactly `n` times over the list front-to-back.
    ///
    /// Steps past the logical end receive the dummy element with
    /// `is_dummy == true`; real elements past `n` are *not* visited.
    pub fn for_each<F>(&self, n: usize, mut f: F) -> Result<()>
    where
        T: Default,
        F: FnMut(&T, bool, usize) -> Result<()>,
    {
        let mut it = self.start_iterating();
        for i in 0..n {
            let (element, is_dummy) = it.next()?;
            f(&element, is_dummy, i)?;
        }
        Ok(())
    }

    /// Prover-side snapshot of the elements front-to-back.
    #[must_use]
    pub fn elements(&self) -> Vec<T> {
        self.witness.iter().map(|w| w.element.clone()).collect()
    }
}

impl<T, L: LinkHash<T>> Default for AuthenticatedList<T, L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, L> Clone for AuthenticatedList<T, L> {
    fn clone(&self) -> Self {
        Self {
            hash: self.hash,
            empty_hash: self.empty_hash,
            witness: self.witness.clone(),
            _link: PhantomData,
        }
    }
}

/// Equality is commitment equality; the witness never participates.
impl<T, L> PartialEq for AuthenticatedList<T, L> {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.empty_hash == other.empty_hash
    }
}

impl<T, L> Eq for AuthenticatedList<T, L> {}

impl<T, L> fmt::Debug for AuthenticatedList<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedList")
            .field("hash", &self.hash)
            .field("len", &self.witness.len())
            .finish_non_exhaustive()
    }
}
