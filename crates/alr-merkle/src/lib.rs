// crates/alr-merkle/src/lib.rs

//! Sparse fixed-height Merkle key→value map.
//!
//! - Leaves are `BLAKE3(key ‖ value)` under a leaf prefix; interior nodes
//!   hash their children under a node prefix; absent subtrees hash to a
//!   per-level zero chain, so the empty root is a pure function of height.
//! - `root` commits to the current (key, value) set and `length` counts
//!   inserted keys, which is how "key absent" is decided without a
//!   non-membership proof.
//! - Leaf index 0 is a reserved `(0, 0)` sentinel: writing value 0 to key 0
//!   is the canonical dummy update and leaves the root untouched.
//!
//! The map is prover-local state. Speculative evaluation snapshots it with
//! `clone()` and commits or rolls back via [`MerkleMap::overwrite_if`].

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]

use std::collections::HashMap;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use alr_crypto::{hash_with_prefix, prefix, Field};

/// Smallest usable height (a root over two leaves).
pub const MIN_HEIGHT: u32 = 2;
/// Largest supported height (2^51 leaves is beyond any realistic backlog).
pub const MAX_HEIGHT: u32 = 52;

/// Hash one leaf.
#[inline]
#[must_use]
pub fn leaf_hash(key: Field, value: Field) -> Field {
    hash_with_prefix(prefix::MERKLE_LEAF, &[key, value])
}

/// Hash one interior node.
#[inline]
#[must_use]
pub fn node_hash(left: Field, right: Field) -> Field {
    hash_with_prefix(prefix::MERKLE_NODE, &[left, right])
}

/// Root of an empty map of the given height (sentinel leaf included).
///
/// This is the genesis `root` commitment.
pub fn empty_root(height: u32) -> Result<Field> {
    Ok(MerkleMap::new(height)?.root())
}

/// Sparse Merkle map of `Field` keys to `Field` values.
///
/// Level 0 holds leaf hashes; level `height - 1` is the root. Keys get leaf
/// indexes in insertion order, so `(root, length)` evolve deterministically
/// from the update sequence.
///
/// Serialization keeps only `(height, leaves)`; node caches and indexes are
/// rebuilt on deserialize.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(into = "MapWire", try_from = "MapWire")]
pub struct MerkleMap {
    height: u32,
    length: u64,
    /// `nodes[level][index]`; missing entries hash to `zeros[level]`.
    nodes: Vec<HashMap<u64, Field>>,
    /// Empty-subtree hash per level.
    zeros: Vec<Field>,
    /// Key → leaf index.
    indexes: HashMap<Field, u64>,
    /// Leaf index → (key, value). Index 0 is the sentinel.
    leaves: Vec<(Field, Field)>,
}

impl MerkleMap {
    /// Create an empty map with capacity `2^(height-1)` leaves.
    pub fn new(height: u32) -> Result<Self> {
        ensure!(
            (MIN_HEIGHT..=MAX_HEIGHT).contains(&height),
            "Merkle map height {height} outside [{MIN_HEIGHT}, {MAX_HEIGHT}]"
        );
        let mut zeros = Vec::with_capacity(height as usize);
        zeros.push(Field::ZERO);
        for level in 1..height as usize {
            let below = zeros[level - 1];
            zeros.push(node_hash(below, below));
        }
        let mut map = Self {
            height,
            length: 0,
            nodes: vec![HashMap::new(); height as usize],
            zeros,
            indexes: HashMap::new(),
            leaves: Vec::new(),
        };
        // Reserved sentinel leaf: key 0 is always present with value 0.
        map.indexes.insert(Field::ZERO, 0);
        map.leaves.push((Field::ZERO, Field::ZERO));
        map.write_leaf(0, leaf_hash(Field::ZERO, Field::ZERO));
        Ok(map)
    }

    /// Tree height (levels including the root).
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Number of inserted keys (the sentinel is not counted).
    #[inline]
    #[must_use]
    pub const fn length(&self) -> u64 {
        self.length
    }

    /// Maximum number of leaves, sentinel included.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u64 {
        1u64 << (self.height - 1)
    }

    /// Current root commitment.
    #[must_use]
    pub fn root(&self) -> Field {
        self.node(self.height as usize - 1, 0)
    }

    /// Value stored under `key`, if the key was ever inserted.
    ///
    /// The sentinel makes `get_option(0)` always `Some`.
    #[must_use]
    pub fn get_option(&self, key: Field) -> Option<Field> {
        let idx = *self.indexes.get(&key)?;
        Some(self.leaves[idx as usize].1)
    }

    /// Insert or update `key`, returning the previous value if the key
    /// existed.
    ///
    /// Fails only when a fresh key would exceed capacity.
    pub fn set(&mut self, key: Field, value: Field) -> Result<Option<Field>> {
        if let Some(&idx) = self.indexes.get(&key) {
            let previous = self.leaves[idx as usize].1;
            self.leaves[idx as usize].1 = value;
            self.write_leaf(idx, leaf_hash(key, value));
            return Ok(Some(previous));
        }
        let idx = self.leaves.len() as u64;
        ensure!(
            idx < self.capacity(),
            "Merkle map at height {} is full ({} leaves)",
            self.height,
            idx
        );
        self.indexes.insert(key, idx);
        self.leaves.push((key, value));
        self.write_leaf(idx, leaf_hash(key, value));
        self.length += 1;
        Ok(None)
    }

    /// [`set`](Self::set) gated on `cond`; a disabled write is routed to the
    /// sentinel `(0, 0)` so the call still runs one update of fixed shape.
    pub fn set_if(&mut self, cond: bool, key: Field, value: Field) -> Result<Option<Field>> {
        if cond {
            self.set(key, value)
        } else {
            self.set(Field::ZERO, Field::ZERO)
        }
    }

    /// Replace this map's entire contents with `other`'s when `cond` holds.
    ///
    /// The two-phase-commit primitive: commit a speculative snapshot into
    /// the authoritative map, or roll the snapshot back, both as plain
    /// guarded overwrites.
    pub fn overwrite_if(&mut self, cond: bool, other: &Self) -> Result<()> {
        ensure!(
            self.height == other.height,
            "Tree height must match ({} vs {})",
            self.height,
            other.height
        );
        if cond {
            *self = other.clone();
        }
        Ok(())
    }

    fn node(&self, level: usize, index: u64) -> Field {
        self.nodes[level]
            .get(&index)
            .copied()
            .unwrap_or(self.zeros[level])
    }

    /// Store a leaf hash and rehash the path to the root.
    fn write_leaf(&mut self, index: u64, leaf: Field) {
        self.nodes[0].insert(index, leaf);
        let mut idx = index;
        let mut cur = leaf;
        for level in 1..self.height as usize {
            let sibling = self.node(level - 1, idx ^ 1);
            cur = if idx & 1 == 0 {
                node_hash(cur, sibling)
            } else {
                node_hash(sibling, cur)
            };
            idx >>= 1;
            self.nodes[level].insert(idx, cur);
        }
    }
}

/// Wire form: everything else is derived.
#[derive(Clone, Serialize, Deserialize)]
struct MapWire {
    height: u32,
    leaves: Vec<(Field, Field)>,
}

impl From<MerkleMap> for MapWire {
    fn from(map: MerkleMap) -> Self {
        Self {
            height: map.height,
            leaves: map.leaves,
        }
    }
}

impl TryFrom<MapWire> for MerkleMap {
    type Error = anyhow::Error;

    fn try_from(wire: MapWire) -> Result<Self> {
        let mut map = Self::new(wire.height)?;
        // Leaf 0 routes through `set` too, in case the sentinel value was
        // overwritten before serialization.
        for (key, value) in wire.leaves {
            map.set(key, value)?;
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_map() -> MerkleMap {
        MerkleMap::new(6).unwrap()
    }

    #[test]
    fn empty_roots_depend_on_height_only() {
        assert_eq!(empty_root(6).unwrap(), mk_map().root());
        assert_ne!(empty_root(6).unwrap(), empty_root(7).unwrap());
    }

    #[test]
    fn set_reports_previous_value() {
        let mut map = mk_map();
        let k = Field::from(1);
        assert_eq!(map.set(k, Field::from(5)).unwrap(), None);
        assert_eq!(map.set(k, Field::from(6)).unwrap(), Some(Field::from(5)));
        assert_eq!(map.get_option(k), Some(Field::from(6)));
        assert_eq!(map.get_option(Field::from(2)), None);
    }

    #[test]
    fn length_counts_fresh_keys_once() {
        let mut map = mk_map();
        assert_eq!(map.length(), 0);
        map.set(Field::from(1), Field::from(10)).unwrap();
        map.set(Field::from(2), Field::from(20)).unwrap();
        map.set(Field::from(1), Field::from(11)).unwrap();
        assert_eq!(map.length(), 2);
    }

    #[test]
    fn zero_key_writes_are_dummy_updates() {
        let mut map = mk_map();
        let root = map.root();
        let prev = map.set(Field::ZERO, Field::ZERO).unwrap();
        assert_eq!(prev, Some(Field::ZERO));
        assert_eq!(map.root(), root);
        assert_eq!(map.length(), 0);

        // Disabled conditional writes route to the sentinel.
        map.set_if(false, Field::from(3), Field::from(30)).unwrap();
        assert_eq!(map.root(), root);
        assert_eq!(map.get_option(Field::from(3)), None);
    }

    #[test]
    fn root_changes_with_every_distinct_state() {
        let mut map = mk_map();
        let r0 = map.root();
        map.set(Field::from(1), Field::from(5)).unwrap();
        let r1 = map.root();
        map.set(Field::from(1), Field::from(7)).unwrap();
        let r2 = map.root();
        assert!(r0 != r1 && r1 != r2 && r0 != r2);

        // Same update sequence reproduces the same root.
        let mut again = mk_map();
        again.set(Field::from(1), Field::from(5)).unwrap();
        again.set(Field::from(1), Field::from(7)).unwrap();
        assert_eq!(again.root(), r2);
    }

    #[test]
    fn overwrite_if_commits_or_keeps() {
        let mut map = mk_map();
        map.set(Field::from(1), Field::from(5)).unwrap();
        let mut speculative = map.clone();
        speculative.set(Field::from(2), Field::from(9)).unwrap();

        let mut rolled_back = map.clone();
        rolled_back.overwrite_if(false, &speculative).unwrap();
        assert_eq!(rolled_back.root(), map.root());

        map.overwrite_if(true, &speculative).unwrap();
        assert_eq!(map.root(), speculative.root());
        assert_eq!(map.length(), 2);
    }

    #[test]
    fn overwrite_if_rejects_height_mismatch() {
        let mut map = mk_map();
        let other = MerkleMap::new(7).unwrap();
        let err = map.overwrite_if(true, &other).unwrap_err();
        assert!(err.to_string().contains("Tree height must match"));
    }

    #[test]
    fn clone_is_independent() {
        let mut map = mk_map();
        map.set(Field::from(1), Field::from(5)).unwrap();
        let snapshot = map.clone();
        map.set(Field::from(2), Field::from(6)).unwrap();
        assert_ne!(map.root(), snapshot.root());
        assert_eq!(snapshot.get_option(Field::from(2)), None);
    }

    #[test]
    fn survives_serde_round_trip() {
        let mut map = mk_map();
        map.set(Field::from(1), Field::from(5)).unwrap();
        let json = serde_json::to_string(&map).unwrap();
        let back: MerkleMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back.root(), map.root());
        assert_eq!(back.length(), map.length());
        assert_eq!(back.get_option(Field::from(1)), Some(Field::from(5)));
    }

    #[test]
    fn rejects_degenerate_heights() {
        assert!(MerkleMap::new(1).is_err());
        assert!(MerkleMap::new(53).is_err());
    }

    #[test]
    fn capacity_is_enforced() {
        // Height 2 → two leaves, one taken by the sentinel.
        let mut map = MerkleMap::new(2).unwrap();
        map.set(Field::from(1), Field::from(1)).unwrap();
        assert!(map.set(Field::from(2), Field::from(2)).is_err());
        // Updates to existing keys still work at capacity.
        map.set(Field::from(1), Field::from(3)).unwrap();
    }
}
