//! Token balance interface and in-memory implementation.
//!
//! Provides the [`TokenStore`] trait the engines use to observe externally
//! held balances and move funds, and [`MemoryTokenStore`] for tests and
//! single-process hosts. Transfers are all-or-nothing: a failed transfer
//! leaves both balances untouched.

use std::collections::HashMap;

use crate::error::{StoreError, WeirError};
use crate::types::{Address, Amount, AssetId};

/// External token balance book.
///
/// The treasury reads its own balance here to detect reward inflows that
/// arrived without notification, and pays rewards out through `transfer`.
pub trait TokenStore: Send + Sync {
    /// Current balance of `holder` in `asset`.
    fn balance_of(&self, asset: AssetId, holder: Address) -> Amount;

    /// Move `amount` of `asset` from `from` to `to`.
    ///
    /// Must either fully apply or fail without any balance change.
    fn transfer(
        &mut self,
        asset: AssetId,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), WeirError>;
}

/// In-memory token balances keyed by `(asset, holder)`.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    balances: HashMap<(AssetId, Address), Amount>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `holder` with `amount` of `asset`. Fixture helper: this is
    /// how external inflows (swap fees, third-party transfers) arrive.
    pub fn credit(&mut self, asset: AssetId, holder: Address, amount: Amount) {
        let balance = self.balances.entry((asset, holder)).or_default();
        *balance = balance.saturating_add(amount);
    }
}

impl TokenStore for MemoryTokenStore {
    fn balance_of(&self, asset: AssetId, holder: Address) -> Amount {
        self.balances.get(&(asset, holder)).copied().unwrap_or(0)
    }

    fn transfer(
        &mut self,
        asset: AssetId,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), WeirError> {
        if amount == 0 {
            return Ok(());
        }
        let have = self.balance_of(asset, from);
        if have < amount {
            return Err(StoreError::InsufficientBalance {
                asset: asset.to_string(),
                have,
                need: amount,
            }
            .into());
        }
        self.balances.insert((asset, from), have - amount);
        let to_balance = self.balances.entry((asset, to)).or_default();
        *to_balance = to_balance.saturating_add(amount);
        Ok(())
    }
}
