//! Tiny toy backlog generator used by the CLI `generate` subcommand and
//! the bench harness. Produces `updates` dispatched updates with
//! 1..=`max_actions` actions each.

use std::collections::HashMap;

use rand::{rngs::StdRng, Rng as _, SeedableRng};

use alr_crypto::Field;

use crate::action::Action;

/// Generate a synthetic action backlog:
/// - keys are drawn from `1..=keys` (key 0 is the map's reserved sentinel)
/// - values are random non-zero words
/// - roughly 40% of the writes are guarded, and every guard is issued
///   against a running view of the log, so the whole backlog settles
///   without a discarded checkpoint group
#[must_use]
pub fn generate_backlog(updates: u32, max_actions: u8, keys: u64, seed: u64) -> Vec<Vec<Action>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut view: HashMap<u64, Field> = HashMap::new();
    let mut backlog = Vec::with_capacity(updates as usize);

    for _ in 0..updates {
        let n = rng.random_range(1..=u32::from(max_actions.max(1)));
        let mut batch = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let key = rng.random_range(1..=keys.max(1));
            let value = Field::from(rng.random_range(1..=1_000_000u64));
            let action = if rng.random_bool(0.4) {
                Action::set_guarded(Field::from(key), value, view.get(&key).copied())
            } else {
                Action::set(Field::from(key), value)
            };
            view.insert(key, value);
            batch.push(action);
        }
        backlog.push(batch);
    }
    backlog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_per_seed() {
        let a = generate_backlog(8, 3, 5, 7);
        let b = generate_backlog(8, 3, 5, 7);
        assert_eq!(a, b);
        assert_ne!(a, generate_backlog(8, 3, 5, 8));
    }

    #[test]
    fn respects_the_declared_shape() {
        let keys = 6u64;
        let allowed: Vec<Field> = (1..=keys).map(Field::from).collect();
        let backlog = generate_backlog(20, 3, keys, 1);
        assert_eq!(backlog.len(), 20);
        for batch in &backlog {
            assert!((1..=3).contains(&batch.len()));
            for action in batch {
                assert_ne!(action.key, Field::ZERO);
                assert!(allowed.contains(&action.key));
            }
        }
    }

    #[test]
    fn guards_reference_the_running_view() {
        let backlog = generate_backlog(12, 4, 6, 42);
        let mut view: HashMap<Field, Field> = HashMap::new();
        for action in backlog.iter().flatten() {
            if action.uses_previous_value {
                let expect = view.get(&action.key).copied().unwrap_or(Field::ZERO);
                assert_eq!(action.previous_value, expect);
            }
            view.insert(action.key, action.value);
        }
    }
}
