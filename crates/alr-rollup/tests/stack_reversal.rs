// crates/alr-rollup/tests/stack_reversal.rs
//! End-to-end checks of the stack-reversal program: fetch a backlog,
//! prove the reversal in chunks, and confirm the resulting stack commits
//! to the same batches oldest-first.

use alr_core::{AccountId, Action, ActionSource, MemorySource, StackHashes, TokenId};
use alr_crypto::{empty_action_state, Field};
use alr_rollup::{action_stack_chunk, fetch_action_witnesses, ActionStackState, StackProgram};

const CHUNK: usize = 3;

fn mk_backlog(n: u64) -> (MemorySource, AccountId, TokenId) {
    let account = AccountId(Field::from(1));
    let token = TokenId::default();
    let mut src = MemorySource::new();
    for i in 0..n {
        src.dispatch(
            account,
            token,
            vec![Action::set(Field::from(i + 1), Field::from(100 + i))],
        );
    }
    (src, account, token)
}

/// Stack the full backlog by hand: push batch hashes newest-to-oldest.
fn expected_stack(witnesses: &[alr_rollup::ActionWitness]) -> StackHashes {
    StackHashes::from_reverse(witnesses.iter().map(|w| w.hash))
}

#[test]
fn reversal_equals_reverse_built_chain() {
    // Zero, one, exactly one chunk, and a ragged multiple of chunks.
    for n in [0, 1, CHUNK as u64, 2 * CHUNK as u64 + 1] {
        let (src, account, token) = mk_backlog(n);
        let fetched = fetch_action_witnesses(&src, account, None, token).unwrap();
        assert_eq!(
            fetched.end_action_state,
            src.ledger_action_state(account, token).unwrap()
        );
        assert_eq!(fetched.chain.hash(), fetched.end_action_state);
        assert_eq!(fetched.witnesses.len(), n as usize);

        let program = StackProgram::new(CHUNK, true);
        let proof = program
            .prove(fetched.end_action_state, &fetched.witnesses)
            .unwrap();

        let expected = expected_stack(&fetched.witnesses);
        assert_eq!(proof.public_output.stack, expected.hash());
        if n > 0 {
            proof.verify(program.vk()).unwrap();
            assert_eq!(proof.public_output.actions, empty_action_state());
            assert_eq!(proof.public_input, fetched.end_action_state);
        }

        // Popping the reconstructed stack yields dispatch order again.
        let mut stack = expected;
        for w in &fetched.witnesses {
            assert_eq!(stack.pop().unwrap(), w.hash);
        }
        assert!(stack.is_empty());
    }
}

#[test]
fn partial_proof_reserves_the_oldest_prefix() {
    let (src, account, token) = mk_backlog(7);
    let fetched = fetch_action_witnesses(&src, account, None, token).unwrap();
    let program = StackProgram::new(CHUNK, true);

    let partial = program
        .prove_partial(fetched.end_action_state, &fetched.witnesses, 2)
        .unwrap();
    assert!(partial.is_recursive);
    assert_eq!(partial.witnesses.len(), 2);
    assert_eq!(partial.witnesses[0], fetched.witnesses[0]);
    partial.proof.verify(program.vk()).unwrap();
    assert_eq!(
        partial.proof.public_output.actions,
        fetched.witnesses[2].state_before
    );

    // The verifier finishes the held-back prefix inline and lands on the
    // full reversed stack.
    let slots: Vec<_> = partial.witnesses.iter().copied().map(Some).collect();
    let out = action_stack_chunk(2, partial.proof.public_output, &slots).unwrap();
    assert_eq!(out.actions, empty_action_state());
    assert_eq!(out.stack, expected_stack(&fetched.witnesses).hash());
}

#[test]
fn short_backlog_is_finished_entirely_inline() {
    let (src, account, token) = mk_backlog(2);
    let fetched = fetch_action_witnesses(&src, account, None, token).unwrap();
    let program = StackProgram::new(CHUNK, true);

    let partial = program
        .prove_partial(fetched.end_action_state, &fetched.witnesses, 4)
        .unwrap();
    assert!(!partial.is_recursive);
    assert!(partial.proof.is_dummy());
    assert_eq!(partial.witnesses.len(), 2);

    let slots: Vec<_> = partial.witnesses.iter().copied().map(Some).collect();
    let start = ActionStackState::start_at(fetched.end_action_state);
    let out = action_stack_chunk(4, start, &slots).unwrap();
    assert_eq!(out.actions, empty_action_state());
    assert_eq!(out.stack, expected_stack(&fetched.witnesses).hash());
}

#[test]
fn proofs_disabled_claims_the_same_output() {
    let (src, account, token) = mk_backlog(5);
    let fetched = fetch_action_witnesses(&src, account, None, token).unwrap();

    let enabled = StackProgram::new(CHUNK, true)
        .prove(fetched.end_action_state, &fetched.witnesses)
        .unwrap();
    let program = StackProgram::new(CHUNK, false);
    let disabled = program
        .prove(fetched.end_action_state, &fetched.witnesses)
        .unwrap();

    assert_eq!(disabled.public_output, enabled.public_output);
    assert!(disabled.is_dummy());
    assert!(disabled.verify(program.vk()).is_err());
}

#[test]
fn tampered_link_fails_the_walk() {
    let (src, account, token) = mk_backlog(4);
    let mut fetched = fetch_action_witnesses(&src, account, None, token).unwrap();
    fetched.witnesses[2].state_before = Field::from(12345);

    let program = StackProgram::new(CHUNK, true);
    let err = program
        .prove(fetched.end_action_state, &fetched.witnesses)
        .unwrap_err();
    assert!(err.to_string().contains("mismatch"));
}
