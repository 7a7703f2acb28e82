//! Planning and per-transaction batch processing.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use alr_core::{
    AccountId, Action, ActionChain, ActionList, ActionSource, MemorySource, TokenId,
};
use alr_crypto::{update_sequence_state, Field};
use alr_rollup::{
    action_stack_chunk, fetch_action_witnesses, ActionStackState, ActionWitness, StackProgram,
    StackProof,
};

use crate::cells::ReducerCells;

/* --------------------------------- params ---------------------------------- */

/// Size parameters of a batch reducer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReducerParams {
    /// Action slots processed per transaction.
    pub batch_size: usize,
    /// Reversal steps per recursive stack-proof chunk.
    pub max_updates_per_proof: usize,
    /// Oldest updates held back from the proof and stacked inline.
    pub max_updates_final_proof: usize,
    /// Actions allowed in a single dispatched update.
    pub max_actions_per_update: usize,
    /// Attest and verify stack proofs, or carry claimed dummies.
    pub proofs_enabled: bool,
}

impl ReducerParams {
    /// Defaults around a caller-chosen `batch_size`.
    #[must_use]
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            max_updates_per_proof: 300,
            max_updates_final_proof: 100,
            max_actions_per_update: 4,
            proofs_enabled: true,
        }
    }

    /// Merge environment overrides into `self`.
    ///
    /// Recognized variables:
    /// - `ALR_MAX_UPDATES_PER_PROOF` = `<usize>`
    /// - `ALR_MAX_UPDATES_FINAL_PROOF` = `<usize>`
    /// - `ALR_MAX_ACTIONS_PER_UPDATE` = `<usize>`
    /// - `ALR_PROOFS_ENABLED` = `true` | `false`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("ALR_MAX_UPDATES_PER_PROOF") {
            if let Ok(n) = v.parse::<usize>() {
                self.max_updates_per_proof = n;
            }
        }
        if let Ok(v) = std::env::var("ALR_MAX_UPDATES_FINAL_PROOF") {
            if let Ok(n) = v.parse::<usize>() {
                self.max_updates_final_proof = n;
            }
        }
        if let Ok(v) = std::env::var("ALR_MAX_ACTIONS_PER_UPDATE") {
            if let Ok(n) = v.parse::<usize>() {
                self.max_actions_per_update = n;
            }
        }
        if let Ok(v) = std::env::var("ALR_PROOFS_ENABLED") {
            match v.to_ascii_lowercase().as_str() {
                "1" | "true" => self.proofs_enabled = true,
                "0" | "false" => self.proofs_enabled = false,
                _ => {}
            }
        }
        self
    }
}

/* ---------------------------------- hints ----------------------------------- */

/// Hints carried by one processing transaction.
///
/// `stack` holds the prover-side witness of the (partially consumed)
/// reversed backlog; its serialized form keeps only the commitment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionStackHints {
    /// Trust the stored stack cell instead of rebuilding from the proof.
    pub use_onchain_stack: bool,
    /// Action state processed before this batch.
    pub processed_action_state: Field,
    /// Ledger head the plan was made against.
    pub onchain_action_state: Field,
    /// Expected stored stack when `use_onchain_stack` holds.
    pub onchain_stack: Field,
    /// The reversed backlog with this batch's updates on top.
    pub stack: ActionChain,
    /// Whether the shared proof covers any chain links.
    pub is_recursive: bool,
    /// Witnesses of the held-back final chunk, stacked inline.
    pub witnesses: Vec<ActionWitness>,
}

/// One planned `{proof, hints}` unit, good for exactly one transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreparedBatch {
    /// Reversal proof shared by every batch of the same plan.
    pub proof: StackProof,
    /// Hints for this batch's position in the backlog.
    pub hints: ActionStackHints,
}

/* --------------------------------- reducer ---------------------------------- */

/// Plans and processes per-transaction settlement batches.
#[derive(Clone, Debug)]
pub struct BatchReducer {
    params: ReducerParams,
    program: StackProgram,
}

impl BatchReducer {
    /// Build a reducer, validating the size parameters.
    pub fn new(params: ReducerParams) -> Result<Self> {
        ensure!(params.batch_size > 0, "batch size must be positive");
        ensure!(
            params.max_actions_per_update <= params.batch_size,
            "Actions in one update exceed maximum batch size"
        );
        ensure!(
            params.max_updates_per_proof > 0 && params.max_updates_final_proof > 0,
            "update bounds must be positive"
        );
        let program = StackProgram::new(params.max_updates_per_proof, params.proofs_enabled);
        Ok(Self { params, program })
    }

    /// Size parameters this reducer was built with.
    #[must_use]
    pub const fn params(&self) -> &ReducerParams {
        &self.params
    }

    /// The reversal program instance.
    #[must_use]
    pub const fn program(&self) -> &StackProgram {
        &self.program
    }

    /// Dispatch one update, enforcing the per-update action bound.
    pub fn dispatch(
        &self,
        source: &mut MemorySource,
        account: AccountId,
        token: TokenId,
        batch: Vec<Action>,
    ) -> Result<()> {
        ensure!(
            batch.len() <= self.params.max_actions_per_update,
            "Expected at most {} actions per account update",
            self.params.max_actions_per_update
        );
        source.dispatch(account, token, batch);
        Ok(())
    }

    /// Plan settlement of everything pending past the cells' action state.
    ///
    /// Proves one stack reversal over all but the oldest
    /// `max_updates_final_proof` updates and partitions the backlog into
    /// per-transaction batches of at most `batch_size` actions, taking
    /// whole updates atomically. The first batch rebuilds the stack from
    /// the proof; later batches trust the stack cell the previous batch
    /// stored.
    pub fn prepare_batches<S>(
        &self,
        source: &S,
        cells: &ReducerCells,
        account: AccountId,
        token: TokenId,
    ) -> Result<Vec<PreparedBatch>>
    where
        S: ActionSource + ?Sized,
    {
        let from = cells.action_state();
        let fetched = fetch_action_witnesses(source, account, Some(from), token)?;
        if fetched.witnesses.is_empty() {
            return Ok(Vec::new());
        }
        let end = fetched.end_action_state;
        let partial =
            self.program
                .prove_partial(end, &fetched.witnesses, self.params.max_updates_final_proof)?;

        let mut stack = ActionChain::from_reverse(fetched.chain.elements());
        let mut pending = fetched.chain.start_iterating();
        let mut processed = from;
        let mut use_onchain_stack = false;
        let mut onchain_stack = Field::ZERO;
        let mut batches = Vec::new();

        while pending.peek().is_some() {
            batches.push(PreparedBatch {
                proof: partial.proof.clone(),
                hints: ActionStackHints {
                    use_onchain_stack,
                    processed_action_state: processed,
                    onchain_action_state: end,
                    onchain_stack,
                    stack: stack.clone(),
                    is_recursive: partial.is_recursive,
                    witnesses: partial.witnesses.clone(),
                },
            });

            let mut actions_taken = 0usize;
            let mut lists_taken = 0usize;
            while lists_taken < self.params.batch_size {
                // Peek the upcoming update's width before committing to it.
                let Some(upcoming) = pending.peek() else { break };
                let len = upcoming.len();
                ensure!(
                    actions_taken > 0 || len <= self.params.batch_size,
                    "Actions in one update exceed maximum batch size"
                );
                if actions_taken + len > self.params.batch_size {
                    break;
                }
                pending.next()?;
                let list = stack.pop_if_unsafe(true)?;
                processed = update_sequence_state(processed, list.hash());
                actions_taken += len;
                lists_taken += 1;
            }
            onchain_stack = stack.hash();
            use_onchain_stack = true;
        }
        Ok(batches)
    }

    /// Process one planned batch against the cells.
    ///
    /// `ledger_action_state` is the account's current dispatch head; the
    /// first batch of a plan requires it unchanged since planning.
    /// `callback` runs exactly `batch_size` times with
    /// `(action, is_dummy, index)`; dummy slots carry the all-zero action.
    pub fn process_batch<F>(
        &self,
        cells: &mut ReducerCells,
        ledger_action_state: Field,
        prepared: &PreparedBatch,
        callback: F,
    ) -> Result<()>
    where
        F: FnMut(&Action, bool, usize) -> Result<()>,
    {
        let h = &prepared.hints;

        cells.require_action_state(h.processed_action_state)?;
        cells.require_action_stack_if(h.use_onchain_stack, h.onchain_stack)?;
        if !h.use_onchain_stack {
            ensure!(
                ledger_action_state == h.onchain_action_state,
                "ledger action state moved since planning: hint {}, ledger {ledger_action_state}",
                h.onchain_action_state
            );
        }

        prepared
            .proof
            .verify_if(h.is_recursive && self.params.proofs_enabled, self.program.vk())?;
        if h.is_recursive {
            ensure!(
                prepared.proof.public_input == h.onchain_action_state,
                "recursive public input mismatch"
            );
        }
        let start_state = if h.is_recursive {
            prepared.proof.public_output
        } else {
            ActionStackState::start_at(h.onchain_action_state)
        };
        let slots: Vec<Option<ActionWitness>> = h.witnesses.iter().copied().map(Some).collect();
        let stacking =
            action_stack_chunk(self.params.max_updates_final_proof, start_state, &slots)?;

        let use_new_stack = !h.use_onchain_stack;
        if use_new_stack {
            ensure!(
                stacking.actions == h.processed_action_state,
                "reversed stack does not rewind to the processed action state"
            );
        }
        let stack_to_use = if h.use_onchain_stack {
            h.onchain_stack
        } else {
            stacking.stack
        };

        // The hint keeps its own witness copy; this step may be replayed.
        let mut stack = h.stack.clone();
        ensure!(stack.hash() == stack_to_use, "Stack hash mismatch");

        let n_lists = count_whole_lists(&stack, self.params.batch_size);
        let mut processed = h.processed_action_state;
        let mut flat = ActionList::new();
        for i in 0..self.params.batch_size {
            let should_pop = i < n_lists;
            let list = stack.pop_if_unsafe(should_pop)?;
            ensure!(
                list.len() <= self.params.max_actions_per_update,
                "Expected at most {} actions per account update",
                self.params.max_actions_per_update
            );
            list.for_each(self.params.max_actions_per_update, |action, is_dummy, _| {
                flat.push_if(!is_dummy, action.clone());
                Ok(())
            })?;
            if should_pop {
                processed = update_sequence_state(processed, list.hash());
            }
        }

        flat.for_each(self.params.batch_size, callback)?;

        cells.set(processed, stack.hash());
        Ok(())
    }
}

/// Whole lists from the top of `stack` that fit in `batch_size` action
/// slots, at most one list per slot.
fn count_whole_lists(stack: &ActionChain, batch_size: usize) -> usize {
    let lists = stack.elements();
    let mut actions = 0usize;
    let mut n = 0usize;
    for list in lists.iter().rev() {
        if n == batch_size || actions + list.len() > batch_size {
            break;
        }
        actions += list.len();
        n += 1;
    }
    n
}
