//! Where dispatched actions come from.
//!
//! [`ActionSource`] is the archive-node seam: given an account and a
//! known action state, it returns every batch dispatched past that state,
//! in dispatch order. [`MemorySource`] is the in-process implementation
//! used by the drivers and tests.

use std::collections::HashMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use alr_crypto::{empty_action_state, update_sequence_state, Field};

use crate::action::{batch_hash, Action};

/// An account identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub Field);

/// A token identifier scoping an account's action log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(pub Field);

/// Read access to an account's dispatched actions.
pub trait ActionSource {
    /// Batches dispatched after `from_action_state`, oldest first.
    ///
    /// `None` asks for the full history. A `Some` state must be one the
    /// account actually passed through.
    fn fetch_actions(
        &self,
        account: AccountId,
        from_action_state: Option<Field>,
        token: TokenId,
    ) -> Result<Vec<Vec<Action>>>;

    /// The account's current action state.
    fn ledger_action_state(&self, account: AccountId, token: TokenId) -> Result<Field>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct AccountLog {
    batches: Vec<Vec<Action>>,
    // states[i] is the action state before batch i; the last entry is
    // the current state.
    states: Vec<Field>,
}

impl AccountLog {
    fn new() -> Self {
        Self {
            batches: Vec::new(),
            states: vec![empty_action_state()],
        }
    }
}

/// In-memory action log, one chain per `(account, token)`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemorySource {
    accounts: HashMap<(AccountId, TokenId), AccountLog>,
}

impl MemorySource {
    /// Empty source with no accounts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one dispatched batch and advance the account's chain.
    pub fn dispatch(&mut self, account: AccountId, token: TokenId, batch: Vec<Action>) {
        let log = self
            .accounts
            .entry((account, token))
            .or_insert_with(AccountLog::new);
        let state = *log.states.last().unwrap_or(&Field::ZERO);
        log.states
            .push(update_sequence_state(state, batch_hash(&batch)));
        log.batches.push(batch);
    }
}

impl ActionSource for MemorySource {
    fn fetch_actions(
        &self,
        account: AccountId,
        from_action_state: Option<Field>,
        token: TokenId,
    ) -> Result<Vec<Vec<Action>>> {
        let Some(log) = self.accounts.get(&(account, token)) else {
            return Ok(Vec::new());
        };
        let from = match from_action_state {
            None => 0,
            Some(state) => {
                let Some(i) = log.states.iter().position(|s| *s == state) else {
                    bail!("unknown action state {state} for account {}", account.0);
                };
                i
            }
        };
        Ok(log.batches[from..].to_vec())
    }

    fn ledger_action_state(&self, account: AccountId, token: TokenId) -> Result<Field> {
        Ok(self
            .accounts
            .get(&(account, token))
            .and_then(|log| log.states.last().copied())
            .unwrap_or_else(empty_action_state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::chain_from_batches;

    fn mk_batch(i: u64) -> Vec<Action> {
        vec![
            Action::set(Field::from(i), Field::from(10 * i)),
            Action::set(Field::from(i + 100), Field::from(10 * i + 1)),
        ]
    }

    fn mk_source() -> (MemorySource, AccountId, TokenId) {
        let mut src = MemorySource::new();
        let account = AccountId(Field::from(7));
        let token = TokenId(Field::ZERO);
        for i in 0..3 {
            src.dispatch(account, token, mk_batch(i));
        }
        (src, account, token)
    }

    #[test]
    fn fetch_full_history() {
        let (src, account, token) = mk_source();
        let batches = src.fetch_actions(account, None, token).unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[1], mk_batch(1));
    }

    #[test]
    fn fetch_from_intermediate_state() {
        let (src, account, token) = mk_source();
        let after_one = update_sequence_state(empty_action_state(), batch_hash(&mk_batch(0)));
        let batches = src.fetch_actions(account, Some(after_one), token).unwrap();
        assert_eq!(batches, vec![mk_batch(1), mk_batch(2)]);

        let current = src.ledger_action_state(account, token).unwrap();
        assert!(src
            .fetch_actions(account, Some(current), token)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn unknown_state_is_rejected() {
        let (src, account, token) = mk_source();
        let err = src
            .fetch_actions(account, Some(Field::from(999)), token)
            .unwrap_err();
        assert!(err.to_string().contains("unknown action state"));
    }

    #[test]
    fn ledger_state_matches_chain_commitment() {
        let (src, account, token) = mk_source();
        let chain = chain_from_batches(empty_action_state(), (0..3).map(mk_batch));
        assert_eq!(src.ledger_action_state(account, token).unwrap(), chain.hash());
    }

    #[test]
    fn fresh_account_is_empty() {
        let src = MemorySource::new();
        let account = AccountId(Field::from(1));
        let token = TokenId::default();
        assert!(src.fetch_actions(account, None, token).unwrap().is_empty());
        assert_eq!(
            src.ledger_action_state(account, token).unwrap(),
            empty_action_state()
        );
    }
}
