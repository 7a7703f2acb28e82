//! Stack reversal: prove that a forward action chain equals a given stack.
//!
//! The action state chains batches oldest-to-newest, but settlement wants
//! to consume them oldest-first. The program here walks the chain backward
//! from its head, popping one batch hash per step off the forward chain and
//! pushing it onto a second chain — the stack — so the stack commits to the
//! same batches in reverse order. Each recursive chunk handles
//! `max_updates_per_proof` steps; a trailing partial chunk can be left for
//! the verifier to finish inline.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use alr_core::{
    batch_hash, AccountId, ActionChain, ActionList, ActionSource, Proof, PublicIo, StackHashes,
    TokenId, VerificationKey,
};
use alr_crypto::{empty_action_state, update_sequence_state, Blake3Transcript, Field, Transcript};

/* --------------------------------- state ---------------------------------- */

/// Intermediate state of the reversal walk.
///
/// `actions` is the head of the not-yet-reversed forward chain; `stack` is
/// the head of the reverse chain built so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStackState {
    /// Remaining forward chain.
    pub actions: Field,
    /// Reverse chain accumulated so far.
    pub stack: Field,
}

impl ActionStackState {
    /// Fresh walk state anchored at `action_state`, with an empty stack.
    #[must_use]
    pub fn start_at(action_state: Field) -> Self {
        Self {
            actions: action_state,
            stack: empty_action_state(),
        }
    }
}

impl PublicIo for ActionStackState {
    fn absorb_into(&self, tr: &mut Blake3Transcript) {
        tr.absorb_field("actions", &self.actions);
        tr.absorb_field("stack", &self.stack);
    }
}

/// One link of the forward chain, witnessed for the walk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionWitness {
    /// Commitment of the batch dispatched at this link.
    pub hash: Field,
    /// Action state immediately before the batch was dispatched.
    pub state_before: Field,
}

/// Proof that walking back from the public input (the chain head) yields
/// the output's `{actions, stack}` pair.
pub type StackProof = Proof<Field, ActionStackState>;

/* --------------------------------- chunk ----------------------------------- */

/// Run `n_slots` reversal steps from `start` over optional witnesses.
///
/// Slots are consumed at descending index, matching the backward walk:
/// slot `i` must hold the link whose updated state equals the current
/// `actions` head. Empty slots are padding and change nothing. Callers pad
/// to a fixed `n_slots` so the step count never depends on the input.
pub fn action_stack_chunk(
    n_slots: usize,
    start: ActionStackState,
    witnesses: &[Option<ActionWitness>],
) -> Result<ActionStackState> {
    ensure!(
        witnesses.len() <= n_slots,
        "chunk of {} witnesses exceeds {} slots",
        witnesses.len(),
        n_slots
    );
    let mut actions = start.actions;
    let mut stack = StackHashes::empty_at(start.stack);
    for i in (0..n_slots).rev() {
        if let Some(w) = witnesses.get(i).copied().flatten() {
            let implied = update_sequence_state(w.state_before, w.hash);
            ensure!(
                implied == actions,
                "action chain link mismatch at stack slot {i}"
            );
            actions = w.state_before;
            stack.push(w.hash);
        }
    }
    Ok(ActionStackState {
        actions,
        stack: stack.hash(),
    })
}

/* -------------------------------- program ---------------------------------- */

/// The chunked reversal program.
#[derive(Clone, Debug)]
pub struct StackProgram {
    max_updates_per_proof: usize,
    proofs_enabled: bool,
    vk: VerificationKey,
}

impl StackProgram {
    /// Compile the program for a fixed chunk size.
    #[must_use]
    pub fn new(max_updates_per_proof: usize, proofs_enabled: bool) -> Self {
        let vk = VerificationKey::compile("alr.action-stack", &[max_updates_per_proof as u64]);
        Self {
            max_updates_per_proof,
            proofs_enabled,
            vk,
        }
    }

    /// Verification key of this instantiation.
    #[must_use]
    pub const fn vk(&self) -> &VerificationKey {
        &self.vk
    }

    /// Reversal steps per recursive chunk.
    #[must_use]
    pub const fn max_updates_per_proof(&self) -> usize {
        self.max_updates_per_proof
    }

    /// Whether proofs are attested or replaced by claimed dummies.
    #[must_use]
    pub const fn proofs_enabled(&self) -> bool {
        self.proofs_enabled
    }

    /// Prove the reversal of the whole chain below `end_action_state`.
    ///
    /// `witnesses` must be in dispatch order (oldest first) and chain up to
    /// `end_action_state`. Chunks are proved newest-first so the final
    /// proof's output covers the entire input; its stack pops oldest-first.
    /// With proofs disabled — or when there is nothing to reverse — the
    /// result is a dummy carrying the same claimed output, which still must
    /// match the precomputed stack.
    pub fn prove(&self, end_action_state: Field, witnesses: &[ActionWitness]) -> Result<StackProof> {
        let mut expected = StackHashes::new();
        for w in witnesses.iter().rev() {
            expected.push(w.hash);
        }
        let expected_stack = expected.hash();

        if !self.proofs_enabled {
            let actions = witnesses.first().map_or(end_action_state, |w| w.state_before);
            let out = ActionStackState {
                actions,
                stack: expected_stack,
            };
            return Ok(StackProof::dummy(self.vk, end_action_state, out));
        }

        let chunk = self.max_updates_per_proof;
        let n_chunks = witnesses.len().div_ceil(chunk);
        // Zero chunks leave this identity-walk dummy in place.
        let mut proof = StackProof::dummy(
            self.vk,
            end_action_state,
            ActionStackState::start_at(end_action_state),
        );
        let mut is_recursive = false;

        for j in (0..n_chunks).rev() {
            let base = j * chunk;
            let slots: Vec<Option<ActionWitness>> =
                (0..chunk).map(|k| witnesses.get(base + k).copied()).collect();
            let start = if is_recursive {
                proof.verify(&self.vk)?;
                ensure!(
                    proof.public_input == end_action_state,
                    "recursive public input mismatch"
                );
                proof.public_output
            } else {
                ActionStackState::start_at(end_action_state)
            };
            let out = action_stack_chunk(chunk, start, &slots)?;
            proof = StackProof::attest(self.vk, end_action_state, out);
            is_recursive = true;
        }

        ensure!(proof.public_output.stack == expected_stack, "Stack hash mismatch");
        Ok(proof)
    }

    /// Prove all but the oldest `final_chunk_size` witnesses.
    ///
    /// The held-back prefix is returned for the verifier to finish inline,
    /// saving one recursive verification when the backlog tail is short.
    pub fn prove_partial(
        &self,
        end_action_state: Field,
        witnesses: &[ActionWitness],
        final_chunk_size: usize,
    ) -> Result<PartialStackProof> {
        let split = final_chunk_size.min(witnesses.len());
        let (final_witnesses, remaining) = witnesses.split_at(split);
        let proof = self.prove(end_action_state, remaining)?;
        Ok(PartialStackProof {
            proof,
            witnesses: final_witnesses.to_vec(),
            is_recursive: !remaining.is_empty(),
        })
    }
}

/// Output of [`StackProgram::prove_partial`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartialStackProof {
    /// Reversal proof over everything past the held-back prefix.
    pub proof: StackProof,
    /// Oldest witnesses, left for the verifier to stack inline.
    pub witnesses: Vec<ActionWitness>,
    /// Whether `proof` actually covers any links.
    pub is_recursive: bool,
}

/* -------------------------------- fetching ---------------------------------- */

/// Backlog fetched from an action source, with the per-link witnesses the
/// reversal program needs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchedWitnesses {
    /// Chain head after the last pending batch.
    pub end_action_state: Field,
    /// One witness per pending batch, oldest first.
    pub witnesses: Vec<ActionWitness>,
    /// The pending batches as a chain, seeded at the fetch anchor.
    pub chain: ActionChain,
}

/// Fetch pending batches past `from_action_state` and derive their chain
/// links.
pub fn fetch_action_witnesses<S>(
    source: &S,
    account: AccountId,
    from_action_state: Option<Field>,
    token: TokenId,
) -> Result<FetchedWitnesses>
where
    S: ActionSource + ?Sized,
{
    let from = from_action_state.unwrap_or_else(empty_action_state);
    let batches = source.fetch_actions(account, from_action_state, token)?;

    let mut chain = ActionChain::empty_at(from);
    let mut witnesses = Vec::with_capacity(batches.len());
    let mut state = from;
    for batch in batches {
        let hash = batch_hash(&batch);
        witnesses.push(ActionWitness {
            hash,
            state_before: state,
        });
        state = update_sequence_state(state, hash);
        chain.push(ActionList::from_elements(batch));
    }
    Ok(FetchedWitnesses {
        end_action_state: state,
        witnesses,
        chain,
    })
}
