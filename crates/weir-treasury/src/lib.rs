//! # weir-treasury
//!
//! The lock-and-vest treasury for the Weir protocol: holds deposited
//! collateral positions under a time lock, distributes any number of
//! reward assets proportionally to locked weight, and vests minted
//! protocol rewards with an early-exit penalty.
//!
//! The engine is pure ledger accounting. Token balances and position
//! custody live behind the `weir-core` store traits; the hosting ledger
//! decides when calls happen and supplies the clock.

pub mod position;
pub mod stream;
pub mod treasury;
pub mod vesting;

pub use position::{AccountLiquidity, LockedPosition, PositionTemplate, PositionView};
pub use stream::{RewardStream, StreamAccount};
pub use treasury::Treasury;
pub use vesting::{EarnedBalances, EarningsTranche, WithdrawableBalance};
