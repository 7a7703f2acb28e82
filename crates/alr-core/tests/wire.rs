// crates/alr-core/tests/wire.rs
//! JSON wire shapes at the tool boundary: backlog files, chain
//! commitments, and the settled-state triple.

use alr_core::chain_from_batches;
use alr_core::prelude::*;
use alr_crypto::{empty_action_state, Field};

#[test]
fn backlog_file_round_trip_preserves_the_chain() {
    let backlog = vec![
        vec![Action::set(Field::from(1), Field::from(5))],
        vec![
            Action::set_guarded(Field::from(1), Field::from(6), Some(Field::from(5))),
            Action::set(Field::from(2), Field::from(7)).with_payload(vec![Field::from(42)]),
        ],
    ];
    let chain = chain_from_batches(empty_action_state(), backlog.clone());

    let wire = serde_json::to_string(&backlog).unwrap();
    let parsed: Vec<Vec<Action>> = serde_json::from_str(&wire).unwrap();
    assert_eq!(parsed, backlog);
    assert_eq!(
        chain_from_batches(empty_action_state(), parsed).hash(),
        chain.hash()
    );
}

#[test]
fn chain_wire_carries_commitments_only() {
    let chain = chain_from_batches(
        empty_action_state(),
        vec![vec![Action::set(Field::from(3), Field::from(9))]],
    );
    let value = serde_json::to_value(&chain).unwrap();
    let obj = value.as_object().unwrap();
    assert!(obj.contains_key("hash"));
    assert!(obj.contains_key("empty_hash"));
    assert!(!obj.contains_key("witness"));

    // Commitments survive; the prover-side witness does not travel.
    let back: ActionChain = serde_json::from_value(value).unwrap();
    assert_eq!(back, chain);
    assert!(back.elements().is_empty());
}

#[test]
fn commitment_wire_keys_are_stable() {
    let commitments = StateCommitments::new(Field::from(8), 4, Field::from(2));
    let value = serde_json::to_value(commitments).unwrap();
    let obj = value.as_object().unwrap();
    assert_eq!(obj.len(), 3);
    for key in ["root", "length", "action_state"] {
        assert!(obj.contains_key(key), "missing {key}");
    }

    let back: StateCommitments = serde_json::from_value(value).unwrap();
    assert_eq!(back, commitments);
}
