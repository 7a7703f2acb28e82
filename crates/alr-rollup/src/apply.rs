//! Out-of-circuit twins of the fold.
//!
//! Clients that only need the settled map (indexers, local reads, test
//! oracles) can replay the action history directly with the same
//! checkpoint semantics as the proved fold, without touching the proof
//! seam.

use anyhow::Result;

use alr_core::{batch_hash, AccountId, Action, ActionSource, StateCommitments, TokenId};
use alr_crypto::{empty_action_state, update_sequence_state, Field};
use alr_merkle::{empty_root, MerkleMap};

/// Commitments of a fresh deployment backed by a map of `height`.
pub fn empty_commitments(height: u32) -> Result<StateCommitments> {
    Ok(StateCommitments::genesis(empty_root(height)?))
}

/// Apply `batches` to `tree` with per-batch checkpoint semantics.
///
/// Each batch is one checkpoint group: a failed previous-value guard
/// anywhere in the batch discards the whole batch's writes, while later
/// batches still apply. The action state advances over every batch either
/// way. Returns the commitments after the last batch.
pub fn apply_actions(
    tree: &mut MerkleMap,
    from_action_state: Field,
    batches: &[Vec<Action>],
) -> Result<StateCommitments> {
    let mut state = from_action_state;
    for batch in batches {
        let mut speculative = tree.clone();
        let mut valid = true;
        for action in batch {
            let previous = speculative.set(action.key, action.value)?;
            if action.uses_previous_value
                && previous.unwrap_or(Field::ZERO) != action.previous_value
            {
                valid = false;
            }
        }
        if valid {
            *tree = speculative;
        }
        state = update_sequence_state(state, batch_hash(batch));
    }
    Ok(StateCommitments::new(tree.root(), tree.length(), state))
}

/// Rebuild an account's settled map from its full action history.
pub fn rebuild_merkle_map<S>(
    source: &S,
    account: AccountId,
    token: TokenId,
    height: u32,
) -> Result<(MerkleMap, StateCommitments)>
where
    S: ActionSource + ?Sized,
{
    let mut tree = MerkleMap::new(height)?;
    let batches = source.fetch_actions(account, None, token)?;
    let commitments = apply_actions(&mut tree, empty_action_state(), &batches)?;
    Ok((tree, commitments))
}
