//! Capability traits consumed by the ledger engines.
//!
//! These are the seams between the engines and the hosting ledger:
//! - [`Clock`]: ledger time (host supplies; see [`crate::clock`])
//! - [`RewardMinter`]: mint seam used by emission claims (weir-treasury
//!   implements)
//! - [`OnwardNotifier`]: routing for chained stake-change forwarding
//!   (host implements; [`NoOnward`] for hosts without chaining)
//!
//! Token balances and position custody have their own store traits in
//! [`crate::store`] and [`crate::custody`].

use crate::error::{EmissionError, WeirError};
use crate::store::TokenStore;
use crate::types::{Address, Amount, AssetId, Timestamp};

/// Monotonic ledger time.
///
/// `now()` must never decrease across calls; the engines trust this and
/// treat an apparent regression as zero elapsed time.
pub trait Clock: Send + Sync {
    /// Current ledger time in seconds.
    fn now(&self) -> Timestamp;
}

/// Mint seam for claimed emission.
///
/// The emission ledger clamps the claim to the remaining mint cap and then
/// hands the amount here. The treasury's implementation pulls the tokens
/// from its vault and opens a vesting tranche (or feeds its own reward
/// stream when minting to itself).
pub trait RewardMinter: Send + Sync {
    /// Mint `amount` to `to`. A zero amount must be a no-op.
    fn mint(
        &mut self,
        tokens: &mut dyn TokenStore,
        now: Timestamp,
        to: Address,
        amount: Amount,
    ) -> Result<(), WeirError>;
}

/// Routes a chained stake-change hop to the accumulator registered under
/// `target`.
///
/// A pool configured with a chained notifier forwards every stake change
/// one hop: `(asset, account, pre-update stake, new total supply)`. The
/// host resolves `target` to the downstream accumulator; exactly one hop
/// is ever taken.
pub trait OnwardNotifier: Send + Sync {
    fn notify(
        &mut self,
        now: Timestamp,
        target: AssetId,
        asset: AssetId,
        account: Address,
        stake: Amount,
        total_supply: Amount,
    ) -> Result<(), WeirError>;
}

/// Onward routing for hosts without chained accumulators.
///
/// Any attempted hop is an error: configuring a chained notifier and then
/// not routing it would silently drop emission.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOnward;

impl OnwardNotifier for NoOnward {
    fn notify(
        &mut self,
        _now: Timestamp,
        target: AssetId,
        _asset: AssetId,
        _account: Address,
        _stake: Amount,
        _total_supply: Amount,
    ) -> Result<(), WeirError> {
        Err(EmissionError::UnknownNotifier(target.to_string()).into())
    }
}
