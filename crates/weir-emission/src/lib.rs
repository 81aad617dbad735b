//! # weir-emission
//!
//! Per-pool emission accounting for the Weir protocol: a registry of
//! staked-asset pools accruing a share of a global emission rate, with
//! lifetime-capped minting and a one-time seed from a predecessor engine.
//!
//! Pools never push rewards. Each staking asset reports balance changes
//! through [`ledger::EmissionLedger::notify_stake_change`], which settles
//! the reporting account against the pool accumulator; accounts pull
//! accrued rewards through [`ledger::EmissionLedger::claim`].

pub mod ledger;
pub mod pool;
pub mod schedule;

pub use ledger::{EmissionLedger, EmissionSource};
pub use pool::{RewardPool, UserStake};
pub use schedule::EmissionSchedule;
