//! On-chain state commitments.

use core::fmt;

use serde::{Deserialize, Serialize};

use alr_crypto::{empty_action_state, Blake3Transcript, Field, Transcript};

use crate::proof::PublicIo;

/// The triple a contract keeps on chain to commit to its offchain state.
///
/// `root` and `length` commit to the Merkle map; `action_state` is the head
/// of the action chain up to which the map has been settled. `length`
/// counts settled leaves and excludes the reserved sentinel, so a fresh
/// deployment starts at zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCommitments {
    /// Root of the settled Merkle map.
    pub root: Field,
    /// Number of settled leaves.
    pub length: u64,
    /// Action state the map is settled up to.
    pub action_state: Field,
}

impl StateCommitments {
    /// Commitments with all three parts given.
    #[must_use]
    pub const fn new(root: Field, length: u64, action_state: Field) -> Self {
        Self {
            root,
            length,
            action_state,
        }
    }

    /// Commitments of a freshly deployed contract: the empty map root at
    /// the configured height, zero length, and the empty action state.
    #[must_use]
    pub fn genesis(empty_root: Field) -> Self {
        Self {
            root: empty_root,
            length: 0,
            action_state: empty_action_state(),
        }
    }
}

impl fmt::Display for StateCommitments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "root={} length={} action_state={}",
            self.root, self.length, self.action_state
        )
    }
}

impl PublicIo for StateCommitments {
    fn absorb_into(&self, tr: &mut Blake3Transcript) {
        tr.absorb_field("root", &self.root);
        tr.absorb_u64("length", self.length);
        tr.absorb_field("action-state", &self.action_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_starts_empty() {
        let root = Field::from(7);
        let c = StateCommitments::genesis(root);
        assert_eq!(c.root, root);
        assert_eq!(c.length, 0);
        assert_eq!(c.action_state, empty_action_state());
    }

    #[test]
    fn display_names_all_parts() {
        let c = StateCommitments::new(Field::from(1), 3, Field::from(2));
        let s = c.to_string();
        assert!(s.contains("root=") && s.contains("length=3") && s.contains("action_state="));
    }
}
