//! Flattening a chain of batches into one checkpointed list.
//!
//! A proof window settles several batches at once, but validity of a
//! guarded action is judged per batch: a wrong `previous_value` discards
//! every update of its batch, not the whole window. Linearization flattens
//! the window's actions into a single list and marks the last real action
//! of each batch as a checkpoint, which is where the fold commits or rolls
//! back the batch's writes.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use alr_crypto::{empty_batch, hash_with_prefix, prefix, Field};
use alr_list::{AuthenticatedList, LinkHash};

use crate::action::{Action, ChainIterator};

/// An action plus its position flag within the flattened window.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearizedAction {
    /// The underlying action.
    pub action: Action,
    /// Set on the last real action of each batch.
    pub is_check_point: bool,
}

impl LinearizedAction {
    /// Hash binding the action to its checkpoint flag.
    #[must_use]
    pub fn hash(&self) -> Field {
        let flags =
            u64::from(self.action.uses_previous_value) | (u64::from(self.is_check_point) << 1);
        hash_with_prefix(
            prefix::LINEARIZED_EVENT,
            &[self.action.hash(), Field::from(flags)],
        )
    }
}

/// Link for the flattened list.
#[derive(Clone, Copy, Debug)]
pub struct LinearizedLink;

impl LinkHash<LinearizedAction> for LinearizedLink {
    fn empty() -> Field {
        empty_batch()
    }
    fn link(hash: &Field, element: &LinearizedAction) -> Field {
        hash_with_prefix(prefix::LINEARIZED, &[*hash, element.hash()])
    }
}

/// The flattened, checkpoint-annotated window.
pub type LinearizedList = AuthenticatedList<LinearizedAction, LinearizedLink>;

/// Flatten up to `max_batches` batches of at most `max_actions_per_update`
/// actions each into one list.
///
/// Consumes exactly `max_batches` steps from `actions` (dummy steps past
/// the end contribute nothing), so the caller's iterator position is the
/// same on every path. Fails if any batch holds more than
/// `max_actions_per_update` actions.
pub fn linearize(
    actions: &mut ChainIterator,
    max_batches: usize,
    max_actions_per_update: usize,
) -> Result<LinearizedList> {
    let too_many = format!("Expected at most {max_actions_per_update} actions per account update");
    let mut linear = LinearizedList::new();

    for _ in 0..max_batches {
        let (batch, _) = actions.next()?;
        let mut inner = batch.start_iterating();
        let mut is_at_end = false;

        for _ in 0..max_actions_per_update {
            let (action, is_dummy) = inner.next()?;
            let now_at_end = inner.is_at_end();
            let is_check_point = now_at_end && !is_at_end;
            is_at_end = is_at_end || now_at_end;
            linear.push_if(
                !is_dummy,
                LinearizedAction {
                    action,
                    is_check_point,
                },
            );
        }
        inner.assert_at_end(&too_many)?;
    }
    Ok(linear)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{chain_from_batches, ActionList};
    use alr_crypto::empty_action_state;

    fn mk_action(i: u64) -> Action {
        Action::set(Field::from(i), Field::from(100 + i))
    }

    fn checkpoints(list: &LinearizedList) -> Vec<bool> {
        list.elements().iter().map(|a| a.is_check_point).collect()
    }

    #[test]
    fn each_batch_ends_in_one_checkpoint() {
        let chain = chain_from_batches(
            empty_action_state(),
            [
                vec![mk_action(1), mk_action(2)],
                vec![mk_action(3)],
                vec![mk_action(4), mk_action(5), mk_action(6)],
            ],
        );
        let mut iter = chain.start_iterating();
        let linear = linearize(&mut iter, 3, 3).unwrap();

        assert_eq!(
            checkpoints(&linear),
            vec![false, true, true, false, false, true]
        );
        assert!(iter.is_at_end());
    }

    #[test]
    fn empty_batch_yields_no_checkpoint() {
        let mut chain = chain_from_batches(empty_action_state(), [vec![mk_action(1)]]);
        chain.push(ActionList::new());
        chain.push(ActionList::from_elements(vec![mk_action(2)]));

        let mut iter = chain.start_iterating();
        let linear = linearize(&mut iter, 3, 2).unwrap();
        assert_eq!(checkpoints(&linear), vec![true, true]);
    }

    #[test]
    fn dummy_batches_past_the_end_contribute_nothing() {
        let chain = chain_from_batches(empty_action_state(), [vec![mk_action(1)]]);
        let mut iter = chain.start_iterating();
        let linear = linearize(&mut iter, 4, 2).unwrap();
        assert_eq!(linear.len(), 1);
        assert!(iter.is_at_end());
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let chain = chain_from_batches(
            empty_action_state(),
            [vec![mk_action(1), mk_action(2), mk_action(3)]],
        );
        let mut iter = chain.start_iterating();
        let err = linearize(&mut iter, 1, 2).unwrap_err();
        assert!(err
            .to_string()
            .contains("Expected at most 2 actions per account update"));
    }

    #[test]
    fn checkpoint_flag_changes_the_hash() {
        let base = LinearizedAction {
            action: mk_action(1),
            is_check_point: false,
        };
        let marked = LinearizedAction {
            is_check_point: true,
            ..base.clone()
        };
        assert_ne!(base.hash(), marked.hash());
    }
}
