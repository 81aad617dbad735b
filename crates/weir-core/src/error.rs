//! Error types for the Weir engines.
//!
//! Every failure is an all-or-nothing abort: operations validate before
//! mutating, so a returned error implies no state change.

use thiserror::Error;

use crate::types::Amount;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmissionError {
    #[error("caller is not the pool configurator")] NotConfigurator,
    #[error("caller is not the owner")] NotOwner,
    #[error("caller may not claim for this account")] NotAuthorized,
    #[error("zero address")] ZeroAddress,
    #[error("pool already registered: {0}")] PoolExists(String),
    #[error("unknown pool: {0}")] UnknownPool(String),
    #[error("schedule already seeded")] AlreadySeeded,
    #[error("no predecessor engine configured")] MissingPredecessor,
    #[error("length mismatch: {assets} assets vs {weights} weights")] LengthMismatch { assets: usize, weights: usize },
    #[error("no route to chained notifier: {0}")] UnknownNotifier(String),
    #[error("arithmetic overflow")] ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreasuryError {
    #[error("caller is not the owner")] NotOwner,
    #[error("caller is not a minter")] NotMinter,
    #[error("caller is neither the account nor its delegate")] NotAuthorized,
    #[error("zero address")] ZeroAddress,
    #[error("invalid pair asset 0 on position {0}")] InvalidPairAsset0(String),
    #[error("invalid pair asset 1 on position {0}")] InvalidPairAsset1(String),
    #[error("invalid fee tier: got {got}, want {want}")] InvalidFeeTier { got: u32, want: u32 },
    #[error("lower bound {got} below template minimum {min}")] LowerBoundOutOfRange { got: i32, min: i32 },
    #[error("upper bound {got} above template maximum {max}")] UpperBoundOutOfRange { got: i32, max: i32 },
    #[error("zero-weight position {0}")] ZeroWeight(String),
    #[error("position not locked by caller: {0}")] PositionNotLocked(String),
    #[error("unknown reward asset: {0}")] UnknownRewardAsset(String),
    #[error("reward asset already registered: {0}")] RewardAssetExists(String),
    #[error("team fee {got} bps exceeds maximum {max}")] FeeTooHigh { got: u64, max: u64 },
    #[error("public exit is not enabled")] PublicExitDisabled,
    #[error("public exit already enabled")] PublicExitAlreadyEnabled,
    #[error("arithmetic overflow")] ArithmeticOverflow,
}

/// Failures surfaced by token / position store implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("insufficient balance of {asset}: have {have}, need {need}")] InsufficientBalance { asset: String, have: Amount, need: Amount },
    #[error("unknown position: {0}")] UnknownPosition(String),
    #[error("position {position} not held by {expected}")] NotHolder { position: String, expected: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WeirError {
    #[error(transparent)] Emission(#[from] EmissionError),
    #[error(transparent)] Treasury(#[from] TreasuryError),
    #[error(transparent)] Store(#[from] StoreError),
}
