//! Batched Merkle-update folding.
//!
//! One fold window settles up to `max_actions_per_proof` pending batches:
//! the window's actions are linearized into a checkpoint-tagged sequence,
//! applied speculatively to a clone of the map, and committed batch by
//! batch at checkpoints — a failed previous-value guard rolls the whole
//! group back instead of failing the proof. Windows chain recursively:
//! each next step verifies the prior proof and starts from its output
//! commitments.

use anyhow::{anyhow, ensure, Result};
use serde::{Deserialize, Serialize};

use alr_core::{linearize, ActionChain, ChainIterator, Proof, StateCommitments, VerificationKey};
use alr_crypto::Field;
use alr_merkle::MerkleMap;

/* --------------------------------- params ---------------------------------- */

/// Size parameters of the fold program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupParams {
    /// Pending batches settled per fold window.
    pub max_actions_per_proof: usize,
    /// Actions allowed in a single dispatched batch.
    pub max_actions_per_update: usize,
    /// Log2 of the map's leaf capacity.
    pub log_total_capacity: u32,
    /// Attest and verify proofs, or run the fold bare for parity testing.
    pub proofs_enabled: bool,
}

impl Default for RollupParams {
    fn default() -> Self {
        Self {
            max_actions_per_proof: 22,
            max_actions_per_update: 4,
            log_total_capacity: 30,
            proofs_enabled: true,
        }
    }
}

impl RollupParams {
    /// Merge environment overrides into the defaults.
    ///
    /// Recognized variables:
    /// - `ALR_MAX_ACTIONS_PER_PROOF` = `<usize>`
    /// - `ALR_MAX_ACTIONS_PER_UPDATE` = `<usize>`
    /// - `ALR_LOG_TOTAL_CAPACITY` = `<u32>`
    /// - `ALR_PROOFS_ENABLED` = `true` | `false`
    #[must_use]
    pub fn from_env() -> Self {
        let mut p = Self::default();
        if let Ok(v) = std::env::var("ALR_MAX_ACTIONS_PER_PROOF") {
            if let Ok(n) = v.parse::<usize>() {
                p.max_actions_per_proof = n;
            }
        }
        if let Ok(v) = std::env::var("ALR_MAX_ACTIONS_PER_UPDATE") {
            if let Ok(n) = v.parse::<usize>() {
                p.max_actions_per_update = n;
            }
        }
        if let Ok(v) = std::env::var("ALR_LOG_TOTAL_CAPACITY") {
            if let Ok(n) = v.parse::<u32>() {
                p.log_total_capacity = n;
            }
        }
        if let Ok(v) = std::env::var("ALR_PROOFS_ENABLED") {
            match v.to_ascii_lowercase().as_str() {
                "1" | "true" => p.proofs_enabled = true,
                "0" | "false" => p.proofs_enabled = false,
                _ => {}
            }
        }
        p
    }

    /// Height of the backing map: one node level above the leaf capacity.
    #[must_use]
    pub const fn tree_height(&self) -> u32 {
        self.log_total_capacity + 1
    }
}

/* ---------------------------------- fold ----------------------------------- */

/// Settle one fold window into `tree`.
///
/// Consumes `actions` fully (the caller slices windows), applies each
/// linearized action to a speculative clone, and at every checkpoint either
/// commits the clone or rolls it back to the last good map. Returns the
/// advanced commitments; the mutated `tree` is the auxiliary output reused
/// by the next window without re-derivation.
pub fn merkle_update_batch(
    params: &RollupParams,
    state: StateCommitments,
    actions: &mut ChainIterator,
    tree: &mut MerkleMap,
) -> Result<StateCommitments> {
    ensure!(
        actions.current_hash() == state.action_state,
        "iterator does not start at the input action state"
    );
    ensure!(
        state.root == tree.root() && state.length == tree.length(),
        "tree does not match the input commitments"
    );

    let linear = linearize(
        actions,
        params.max_actions_per_proof,
        params.max_actions_per_update,
    )?;
    actions.assert_at_end("fold window leaves unconsumed batches")?;

    let mut intermediate = tree.clone();
    let mut is_valid_update = true;
    let total_slots = params.max_actions_per_proof * params.max_actions_per_update;
    linear.for_each(total_slots, |la, is_dummy, _| {
        // Dummy slots write the reserved (0, 0) leaf, which changes nothing.
        let actual_previous = intermediate.set_if(!is_dummy, la.action.key, la.action.value)?;
        let matches = actual_previous.unwrap_or(Field::ZERO) == la.action.previous_value;
        let is_valid_action = !la.action.uses_previous_value || matches;
        is_valid_update = is_valid_update && is_valid_action;

        tree.overwrite_if(la.is_check_point && is_valid_update, &intermediate)?;
        if la.is_check_point {
            is_valid_update = true;
        }
        intermediate.overwrite_if(la.is_check_point, tree)?;
        Ok(())
    })?;

    Ok(StateCommitments {
        root: tree.root(),
        length: tree.length(),
        action_state: actions.current_hash(),
    })
}

/* -------------------------------- program ---------------------------------- */

/// Recursive fold proof: input and output are both map commitments.
pub type RollupProof = Proof<StateCommitments, StateCommitments>;

/// The windowed fold program.
#[derive(Clone, Debug)]
pub struct RollupProgram {
    params: RollupParams,
    vk: VerificationKey,
}

impl RollupProgram {
    /// Compile the program for the given size parameters.
    #[must_use]
    pub fn new(params: RollupParams) -> Self {
        let vk = VerificationKey::compile(
            "alr.merkle-rollup",
            &[
                params.max_actions_per_proof as u64,
                params.max_actions_per_update as u64,
                u64::from(params.tree_height()),
            ],
        );
        Self { params, vk }
    }

    /// Verification key of this instantiation.
    #[must_use]
    pub const fn vk(&self) -> &VerificationKey {
        &self.vk
    }

    /// Size parameters this program was compiled with.
    #[must_use]
    pub const fn params(&self) -> &RollupParams {
        &self.params
    }

    /// First window: no recursive input.
    pub fn first_batch(
        &self,
        state: StateCommitments,
        actions: &mut ChainIterator,
        tree: &mut MerkleMap,
    ) -> Result<RollupProof> {
        let out = merkle_update_batch(&self.params, state, actions, tree)?;
        Ok(RollupProof::attest(self.vk, state, out))
    }

    /// Later window: verifies `prior` and continues from its output.
    pub fn next_batch(
        &self,
        prior: &RollupProof,
        actions: &mut ChainIterator,
        tree: &mut MerkleMap,
    ) -> Result<RollupProof> {
        prior.verify(&self.vk)?;
        let state = prior.public_output;
        let out = merkle_update_batch(&self.params, state, actions, tree)?;
        Ok(RollupProof::attest(self.vk, state, out))
    }

    /// Fold the whole backlog in `chain` into `tree`, keeping every window
    /// proof.
    ///
    /// The returned vector carries one proof per fold window: the first
    /// starts at the pre-fold commitments and each later one starts at its
    /// predecessor's output, so an offline verifier can walk the chain from
    /// the initial commitments to the settled ones. An empty backlog still
    /// runs one all-dummy window. With proofs disabled, folds directly and
    /// returns a single dummy spanning the whole range. Never returns an
    /// empty vector.
    pub fn prove_windows(
        &self,
        tree: &mut MerkleMap,
        chain: &ActionChain,
    ) -> Result<Vec<RollupProof>> {
        ensure!(
            tree.height() == self.params.tree_height(),
            "Tree height must match ({} vs {})",
            tree.height(),
            self.params.tree_height()
        );
        let initial = StateCommitments::new(tree.root(), tree.length(), chain.empty_hash());
        let windows = slice_windows(chain, self.params.max_actions_per_proof);

        if !self.params.proofs_enabled {
            let mut state = initial;
            for w in &windows {
                let mut iter = w.start_iterating();
                state = merkle_update_batch(&self.params, state, &mut iter, tree)?;
            }
            return Ok(vec![RollupProof::dummy(self.vk, initial, state)]);
        }

        let mut iter = windows[0].start_iterating();
        let mut proof = self.first_batch(initial, &mut iter, tree)?;
        let mut proofs = Vec::with_capacity(windows.len());
        for w in &windows[1..] {
            let mut iter = w.start_iterating();
            let next = self.next_batch(&proof, &mut iter, tree)?;
            proofs.push(std::mem::replace(&mut proof, next));
        }
        proofs.push(proof);
        Ok(proofs)
    }

    /// Fold the whole backlog in `chain` into `tree`.
    ///
    /// Same walk as [`Self::prove_windows`], returning only the final
    /// window's proof. Its statement covers the last window; callers that
    /// persist the fold for later verification want the full window chain
    /// instead.
    pub fn prove(&self, tree: &mut MerkleMap, chain: &ActionChain) -> Result<RollupProof> {
        self.prove_windows(tree, chain)?
            .pop()
            .ok_or_else(|| anyhow!("fold produced no windows"))
    }
}

/// Split `chain` into per-window chains of at most `window` batches, each
/// seeded at the state its window starts from. Never returns an empty
/// vector.
fn slice_windows(chain: &ActionChain, window: usize) -> Vec<ActionChain> {
    let batches = chain.elements();
    let mut state = chain.empty_hash();
    let mut windows = Vec::new();
    for group in batches.chunks(window.max(1)) {
        let mut w = ActionChain::empty_at(state);
        for batch in group {
            w.push(batch.clone());
        }
        state = w.hash();
        windows.push(w);
    }
    if windows.is_empty() {
        windows.push(ActionChain::empty_at(state));
    }
    windows
}
