//! The two field-sized cells the reducer keeps on chain.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use alr_crypto::{empty_action_state, Field};

/// Contract-visible state of a reducer: the action state processed so far
/// and the head of the stored (partially consumed) stack.
///
/// Reads are modeled as preconditions: `require_*` fails when the supplied
/// hint no longer matches the cell, which is how a transaction planned
/// against stale state is rejected before it writes anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReducerCells {
    action_state: Field,
    action_stack: Field,
}

impl ReducerCells {
    /// Cells of a freshly deployed reducer: nothing processed, no stored
    /// stack.
    #[must_use]
    pub fn deploy() -> Self {
        Self {
            action_state: empty_action_state(),
            action_stack: Field::ZERO,
        }
    }

    /// Action state processed so far.
    #[must_use]
    pub const fn action_state(&self) -> Field {
        self.action_state
    }

    /// Head of the stored stack.
    #[must_use]
    pub const fn action_stack(&self) -> Field {
        self.action_stack
    }

    /// Precondition on the processed action state.
    pub fn require_action_state(&self, expected: Field) -> Result<()> {
        ensure!(
            self.action_state == expected,
            "stale processed action state: hint {expected}, cell {}",
            self.action_state
        );
        Ok(())
    }

    /// Precondition on the stored stack, checked only when `cond` holds.
    pub fn require_action_stack_if(&self, cond: bool, expected: Field) -> Result<()> {
        if cond {
            ensure!(
                self.action_stack == expected,
                "stale action stack: hint {expected}, cell {}",
                self.action_stack
            );
        }
        Ok(())
    }

    /// Commit both cells at the end of a processed batch.
    pub fn set(&mut self, action_state: Field, action_stack: Field) {
        self.action_state = action_state;
        self.action_stack = action_stack;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_starts_at_the_empty_action_state() {
        let cells = ReducerCells::deploy();
        assert_eq!(cells.action_state(), empty_action_state());
        assert_eq!(cells.action_stack(), Field::ZERO);
        assert!(cells.require_action_state(empty_action_state()).is_ok());
    }

    #[test]
    fn stale_preconditions_fail() {
        let mut cells = ReducerCells::deploy();
        cells.set(Field::from(1), Field::from(2));

        let err = cells.require_action_state(Field::from(9)).unwrap_err();
        assert!(err.to_string().contains("stale processed action state"));

        assert!(cells.require_action_stack_if(false, Field::from(9)).is_ok());
        let err = cells
            .require_action_stack_if(true, Field::from(9))
            .unwrap_err();
        assert!(err.to_string().contains("stale action stack"));
    }
}
