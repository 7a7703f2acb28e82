//! Actions and the pinned two-level chain format.
//!
//! Dispatched actions are committed at two levels. Each batch folds its
//! actions under the sequence prefix starting from the empty-batch seed;
//! the account's `action_state` then chains batch hashes starting from the
//! empty-state seed. Both links share one hash, so a chain of batches and
//! the chain of their hashes commit identically — the reversal stack
//! depends on that.

use serde::{Deserialize, Serialize};

use alr_crypto::{
    empty_action_state, empty_batch, event_hash, push_event, update_sequence_state, Field,
};
use alr_list::{AuthenticatedList, LinkHash, ListIterator};

/// One dispatched action.
///
/// The `(key, value)` pair drives the Merkle map update. An action may
/// additionally pin the value it expects to overwrite (`previous_value`,
/// meaningful only when `uses_previous_value` is set), which is how
/// optimistic concurrency is expressed. `payload` carries application
/// fields that are hashed but otherwise opaque to the rollup.
///
/// The default action is the all-zero dummy; applying it to the map writes
/// `(0, 0)` into the reserved sentinel and changes nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Map key to update.
    pub key: Field,
    /// New value for `key`.
    pub value: Field,
    /// Whether this action pins the previous value.
    pub uses_previous_value: bool,
    /// Expected previous value (zero when the key must be absent).
    pub previous_value: Field,
    /// Application payload fields, hashed ahead of the core tuple.
    #[serde(default)]
    pub payload: Vec<Field>,
}

impl Action {
    /// Unconditional write of `value` under `key`.
    #[must_use]
    pub fn set(key: Field, value: Field) -> Self {
        Self {
            key,
            value,
            ..Self::default()
        }
    }

    /// Write gated on the currently stored value.
    ///
    /// `previous` of `None` pins "key absent" (encoded as zero, which is
    /// also what an absent key reads back as).
    #[must_use]
    pub fn set_guarded(key: Field, value: Field, previous: Option<Field>) -> Self {
        Self {
            key,
            value,
            uses_previous_value: true,
            previous_value: previous.unwrap_or(Field::ZERO),
            payload: Vec::new(),
        }
    }

    /// Attach application payload fields.
    #[must_use]
    pub fn with_payload(mut self, payload: Vec<Field>) -> Self {
        self.payload = payload;
        self
    }

    /// Canonical field encoding: payload, then the core tuple.
    #[must_use]
    pub fn event_fields(&self) -> Vec<Field> {
        let mut fields = Vec::with_capacity(self.payload.len() + 4);
        fields.extend_from_slice(&self.payload);
        fields.push(Field::from(u64::from(self.uses_previous_value)));
        fields.push(self.previous_value);
        fields.push(self.key);
        fields.push(self.value);
        fields
    }

    /// The action's event hash.
    #[must_use]
    pub fn hash(&self) -> Field {
        event_hash(&self.event_fields())
    }
}

/// Link for per-batch folds: seed `empty_batch()`, step [`push_event`].
#[derive(Clone, Copy, Debug)]
pub struct EventLink;

impl LinkHash<Action> for EventLink {
    fn empty() -> Field {
        empty_batch()
    }
    fn link(hash: &Field, element: &Action) -> Field {
        push_event(*hash, element.hash())
    }
}

/// Link for chains of whole batches: seed `empty_action_state()`, step
/// [`update_sequence_state`] over the batch's commitment.
#[derive(Clone, Copy, Debug)]
pub struct SequenceLink;

impl LinkHash<ActionList> for SequenceLink {
    fn empty() -> Field {
        empty_action_state()
    }
    fn link(state: &Field, batch: &ActionList) -> Field {
        update_sequence_state(*state, batch.hash())
    }
}

/// Link for chains of bare batch hashes; commitment-compatible with
/// [`SequenceLink`].
#[derive(Clone, Copy, Debug)]
pub struct SequenceHashLink;

impl LinkHash<Field> for SequenceHashLink {
    fn empty() -> Field {
        empty_action_state()
    }
    fn link(state: &Field, batch_hash: &Field) -> Field {
        update_sequence_state(*state, *batch_hash)
    }
}

/// One dispatched batch of actions.
pub type ActionList = AuthenticatedList<Action, EventLink>;

/// The on-chain action commitment: a chain of batches.
pub type ActionChain = AuthenticatedList<ActionList, SequenceLink>;

/// Forward replay over an [`ActionChain`].
pub type ChainIterator = ListIterator<ActionList, SequenceLink>;

/// A chain of batch hashes — the reversal protocol's stack.
pub type StackHashes = AuthenticatedList<Field, SequenceHashLink>;

/// Commitment of a batch without building the list.
#[must_use]
pub fn batch_hash(actions: &[Action]) -> Field {
    actions
        .iter()
        .fold(empty_batch(), |hash, a| push_event(hash, a.hash()))
}

/// Build the chain for `batches` dispatched after `from_state`.
#[must_use]
pub fn chain_from_batches<I>(from_state: Field, batches: I) -> ActionChain
where
    I: IntoIterator<Item = Vec<Action>>,
{
    let mut chain = ActionChain::empty_at(from_state);
    for batch in batches {
        chain.push(ActionList::from_elements(batch));
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_hash_matches_direct_fold() {
        let actions = vec![
            Action::set(Field::from(1), Field::from(5)),
            Action::set_guarded(Field::from(2), Field::from(6), Some(Field::from(5))),
        ];
        let list = ActionList::from_elements(actions.clone());
        assert_eq!(list.hash(), batch_hash(&actions));
    }

    #[test]
    fn chain_of_lists_equals_chain_of_hashes() {
        let b1 = vec![Action::set(Field::from(1), Field::from(5))];
        let b2 = vec![
            Action::set(Field::from(2), Field::from(7)),
            Action::set(Field::from(3), Field::from(9)),
        ];
        let from = empty_action_state();
        let chain = chain_from_batches(from, [b1.clone(), b2.clone()]);

        let mut hashes = StackHashes::empty_at(from);
        hashes.push(batch_hash(&b1));
        hashes.push(batch_hash(&b2));
        assert_eq!(chain.hash(), hashes.hash());
    }

    #[test]
    fn payload_changes_the_event_hash() {
        let a = Action::set(Field::from(1), Field::from(5));
        let b = a.clone().with_payload(vec![Field::from(42)]);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn guard_flag_is_hashed() {
        let plain = Action::set(Field::from(1), Field::from(5));
        let guarded = Action::set_guarded(Field::from(1), Field::from(5), None);
        assert_ne!(plain.hash(), guarded.hash());
        assert_eq!(guarded.previous_value, Field::ZERO);
    }

    #[test]
    fn dummy_action_is_all_zero() {
        let d = Action::default();
        assert!(d.key.is_zero() && d.value.is_zero() && !d.uses_previous_value);
    }
}
