//! Position lock ledger data: the reference template deposits are checked
//! against, locked-position records, and per-account liquidity views.

use serde::{Deserialize, Serialize};

use weir_core::custody::PositionMetadata;
use weir_core::error::TreasuryError;
use weir_core::types::{Amount, AssetId, PositionId, Timestamp};

/// Reference shape a deposited position must match.
///
/// The pair assets and fee tier must match exactly; the position's bounds
/// must fall within the template's outer bounds.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionTemplate {
    pub asset0: AssetId,
    pub asset1: AssetId,
    pub fee_tier: u32,
    pub lower_bound: i32,
    pub upper_bound: i32,
}

impl PositionTemplate {
    pub fn new(
        asset0: AssetId,
        asset1: AssetId,
        fee_tier: u32,
        lower_bound: i32,
        upper_bound: i32,
    ) -> Self {
        PositionTemplate {
            asset0,
            asset1,
            fee_tier,
            lower_bound,
            upper_bound,
        }
    }

    /// Check a position's metadata against the template. Each attribute
    /// fails with its own error so a depositor can tell what mismatched.
    pub fn validate(&self, id: PositionId, meta: &PositionMetadata) -> Result<(), TreasuryError> {
        if meta.asset0 != self.asset0 {
            return Err(TreasuryError::InvalidPairAsset0(meta.asset0.to_string()));
        }
        if meta.asset1 != self.asset1 {
            return Err(TreasuryError::InvalidPairAsset1(meta.asset1.to_string()));
        }
        if meta.fee_tier != self.fee_tier {
            return Err(TreasuryError::InvalidFeeTier {
                got: meta.fee_tier,
                want: self.fee_tier,
            });
        }
        if meta.lower_bound < self.lower_bound {
            return Err(TreasuryError::LowerBoundOutOfRange {
                got: meta.lower_bound,
                min: self.lower_bound,
            });
        }
        if meta.upper_bound > self.upper_bound {
            return Err(TreasuryError::UpperBoundOutOfRange {
                got: meta.upper_bound,
                max: self.upper_bound,
            });
        }
        if meta.weight == 0 {
            return Err(TreasuryError::ZeroWeight(id.to_string()));
        }
        Ok(())
    }
}

/// A position held in treasury custody.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockedPosition {
    pub id: PositionId,
    pub weight: Amount,
    pub locked_at: Timestamp,
    pub unlocks_at: Timestamp,
}

impl LockedPosition {
    /// Whether the lock is still running at `now`.
    pub fn is_locked(&self, now: Timestamp) -> bool {
        self.unlocks_at > now
    }
}

/// Per-account weight totals split on lock expiry.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct AccountLiquidity {
    pub total: Amount,
    pub locked: Amount,
    pub unlockable: Amount,
}

/// One position as exposed by the account views.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionView {
    pub id: PositionId,
    pub weight: Amount,
    pub unlocks_at: Timestamp,
}

impl From<&LockedPosition> for PositionView {
    fn from(position: &LockedPosition) -> Self {
        PositionView {
            id: position.id,
            weight: position.weight,
            unlocks_at: position.unlocks_at,
        }
    }
}

/// Sum an account's position weights split on `unlocks_at` vs `now`.
pub fn liquidity_of(positions: &[LockedPosition], now: Timestamp) -> AccountLiquidity {
    let mut liquidity = AccountLiquidity::default();
    for position in positions {
        liquidity.total = liquidity.total.saturating_add(position.weight);
        if position.is_locked(now) {
            liquidity.locked = liquidity.locked.saturating_add(position.weight);
        } else {
            liquidity.unlockable = liquidity.unlockable.saturating_add(position.weight);
        }
    }
    liquidity
}

/// Locked weight only: the earning basis for reward streams.
pub fn locked_weight(positions: &[LockedPosition], now: Timestamp) -> Amount {
    positions
        .iter()
        .filter(|p| p.is_locked(now))
        .fold(0, |acc: Amount, p| acc.saturating_add(p.weight))
}
