//! Per-pool accrual state and the accumulator arithmetic behind it.
//!
//! Each pool tracks a monotone `cumulative_reward_per_share`, scaled by
//! [`PRECISION`]. A user's entitlement is `staked * per_share / PRECISION`
//! minus the `reward_debt` recorded when the stake last changed, so the
//! accumulator never needs per-user iteration.

use serde::{Deserialize, Serialize};

use weir_core::constants::PRECISION;
use weir_core::error::EmissionError;
use weir_core::math::mul_div;
use weir_core::types::{Amount, AssetId, Timestamp};

/// Accrual state for one registered staking asset.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RewardPool {
    /// Total staked balance as of the asset's last notification.
    pub total_staked: Amount,
    /// This pool's share of the global rate, relative to the sum of all
    /// registered weights.
    pub allocation_weight: Amount,
    /// Last instant the accumulator was brought current.
    pub last_accrual_time: Timestamp,
    /// Reward per staked unit since registration, scaled by [`PRECISION`].
    pub cumulative_reward_per_share: u128,
    /// Downstream accumulator that receives forwarded stake changes.
    pub chained_notifier: Option<AssetId>,
}

impl RewardPool {
    /// A fresh pool with no stake and an accumulator anchored at `now`.
    pub fn new(allocation_weight: Amount, now: Timestamp) -> Self {
        RewardPool {
            total_staked: 0,
            allocation_weight,
            last_accrual_time: now,
            cumulative_reward_per_share: 0,
            chained_notifier: None,
        }
    }

    /// Accumulator value as of `now`, without committing it.
    ///
    /// Intervals with zero stake or zero total weight contribute nothing;
    /// the caller still commits `now` so idle time is never paid out
    /// retroactively once stake arrives.
    pub fn per_share_at(
        &self,
        now: Timestamp,
        rate_per_second: Amount,
        total_allocation_weight: Amount,
    ) -> Result<u128, EmissionError> {
        if now <= self.last_accrual_time {
            return Ok(self.cumulative_reward_per_share);
        }
        let elapsed = now - self.last_accrual_time;
        let delta = per_share_delta(
            elapsed,
            rate_per_second,
            self.allocation_weight,
            total_allocation_weight,
            self.total_staked,
        )?;
        self.cumulative_reward_per_share
            .checked_add(delta)
            .ok_or(EmissionError::ArithmeticOverflow)
    }

    /// Commit an accumulator value produced by [`RewardPool::per_share_at`]
    /// and advance the accrual clock to `now`.
    pub fn apply_accrual(&mut self, now: Timestamp, per_share: u128) {
        self.cumulative_reward_per_share = per_share;
        if now > self.last_accrual_time {
            self.last_accrual_time = now;
        }
    }
}

/// One account's stake record within a pool.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct UserStake {
    /// Balance reported by the asset's last notification for this account.
    pub staked_amount: Amount,
    /// Reward already attributed to the current stake, recorded at the
    /// accumulator value in force when the stake last changed.
    pub reward_debt: Amount,
}

/// Accumulator increase for an elapsed interval.
///
/// The pool's reward slice is `elapsed * rate * weight / total_weight`,
/// scaled by [`PRECISION`] and spread over the staked supply. Division
/// truncates; the shortfall stays in the accumulator's future.
pub fn per_share_delta(
    elapsed: u64,
    rate_per_second: Amount,
    allocation_weight: Amount,
    total_allocation_weight: Amount,
    total_staked: Amount,
) -> Result<u128, EmissionError> {
    if total_staked == 0 || total_allocation_weight == 0 {
        return Ok(0);
    }
    let raw = (elapsed as u128)
        .checked_mul(rate_per_second)
        .ok_or(EmissionError::ArithmeticOverflow)?;
    let slice = mul_div(raw, allocation_weight, total_allocation_weight)
        .ok_or(EmissionError::ArithmeticOverflow)?;
    mul_div(slice, PRECISION, total_staked).ok_or(EmissionError::ArithmeticOverflow)
}

/// Reward attributed to a stake of `staked_amount` at accumulator value
/// `per_share`. This is the debt recorded on stake changes.
pub fn attributed(staked_amount: Amount, per_share: u128) -> Result<Amount, EmissionError> {
    mul_div(staked_amount, per_share, PRECISION).ok_or(EmissionError::ArithmeticOverflow)
}

/// Reward accrued to a stake beyond its recorded debt.
pub fn pending_reward(stake: &UserStake, per_share: u128) -> Result<Amount, EmissionError> {
    attributed(stake.staked_amount, per_share)?
        .checked_sub(stake.reward_debt)
        .ok_or(EmissionError::ArithmeticOverflow)
}
