//! Field-sized values.
//!
//! Everything the chain commits to — action payload slots, batch hashes,
//! sequence states, Merkle roots — is one fixed-width 32-byte value. Hash
//! outputs and payload values share this type, so chains over elements and
//! chains over their hashes commit identically.

use std::fmt;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// A 32-byte field-sized value.
///
/// Ordering and hashing are byte-lexicographic; serde encodes the raw bytes.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Field(pub [u8; 32]);

impl Field {
    /// The all-zero value. Doubles as the reserved dummy key/value.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Lowercase hex encoding of the raw bytes.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-hex-digit string (with or without a `0x` prefix).
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(s)?;
        ensure!(raw.len() == 32, "expected 32 bytes of hex, got {}", raw.len());
        let mut out = [0u8; 32];
        out.copy_from_slice(&raw);
        Ok(Self(out))
    }

    /// Whether this is the all-zero value.
    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl From<u64> for Field {
    /// Embed a small integer (little-endian in the low 8 bytes).
    fn from(x: u64) -> Self {
        let mut out = [0u8; 32];
        out[..8].copy_from_slice(&x.to_le_bytes());
        Self(out)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix keeps assert/log output readable.
        write!(f, "Field({}…)", &self.to_hex()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::Field;

    #[test]
    fn hex_round_trip() {
        let x = Field::from(0xdead_beefu64);
        let s = x.to_hex();
        assert_eq!(Field::from_hex(&s).unwrap(), x);
        assert_eq!(Field::from_hex(&format!("0x{s}")).unwrap(), x);
    }

    #[test]
    fn from_u64_is_low_bytes() {
        let x = Field::from(1);
        assert_eq!(x.0[0], 1);
        assert!(x.0[1..].iter().all(|&b| b == 0));
        assert!(!x.is_zero());
        assert!(Field::ZERO.is_zero());
    }

    #[test]
    fn rejects_bad_hex() {
        assert!(Field::from_hex("abcd").is_err());
        assert!(Field::from_hex("zz").is_err());
    }
}
