//! Core ledger types: identities, amounts, timestamps.
//!
//! All token amounts use u128 base units (18-decimal tokens fit with
//! headroom for fixed-point intermediates). Timestamps are ledger seconds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token amount in base units.
pub type Amount = u128;

/// Ledger time in seconds. Supplied by the host, non-decreasing across calls.
pub type Timestamp = u64;

/// A 32-byte ledger identity.
///
/// Used for accounts, asset contracts, and custody holders. Pools and
/// reward streams are keyed by the asset's identity, and callers are
/// authenticated by comparing identities.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// The zero address. Rejected wherever an identity is required.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create an Address from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Asset identity. Alias of [`Address`]: an asset is identified by its
/// ledger contract identity, which is also what authenticates its calls.
pub type AssetId = Address;

/// Identifier of a collateral position held by the external position source.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PositionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
