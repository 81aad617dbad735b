//! Protocol constants. Durations in seconds, ratios in basis points.

/// Fixed-point scale for cumulative reward-per-share accounting.
///
/// Per-share accumulators and stored reward rates carry this factor;
/// divisions truncate, and multiplication always precedes division.
pub const PRECISION: u128 = 1_000_000_000_000;

/// Basis-point denominator.
pub const BPS_PRECISION: u128 = 10_000;

/// Upper bound for the team reward fee (50%).
pub const MAX_TEAM_FEE_BPS: u64 = 5_000;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// How long a deposited position stays locked before ordinary withdrawal.
pub const LOCK_DURATION: u64 = 56 * SECONDS_PER_DAY;

/// Length of one reward-distribution epoch. Unseen stream inflows are
/// folded into a fresh epoch only once the previous one has finished.
pub const REWARDS_DURATION: u64 = 7 * SECONDS_PER_DAY;

/// Vesting window for minted reward tranches: four distribution epochs.
///
/// # Examples
///
/// ```
/// use weir_core::constants::{REWARDS_DURATION, VESTING_DURATION};
/// assert_eq!(VESTING_DURATION, REWARDS_DURATION * 4);
/// ```
pub const VESTING_DURATION: u64 = 28 * SECONDS_PER_DAY;
