//! Reward stream accounting: one independent fixed-length distribution
//! epoch per registered reward asset.
//!
//! The per-second rate is stored [`PRECISION`]-scaled so a small inflow
//! over the 7-day epoch still divides cleanly: `rate = amount * PRECISION
//! / REWARDS_DURATION`, the accumulator advances by `elapsed * rate /
//! liquidity_supply`, and an account earns `locked * Δaccumulator /
//! PRECISION`.

use serde::{Deserialize, Serialize};

use weir_core::constants::{PRECISION, REWARDS_DURATION};
use weir_core::error::TreasuryError;
use weir_core::math::mul_div;
use weir_core::types::{Amount, Timestamp};

/// Distribution state for one reward asset.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RewardStream {
    /// End of the running epoch; accrual clamps here.
    pub period_finish: Timestamp,
    /// Tokens per second, scaled by [`PRECISION`].
    pub reward_rate: u128,
    /// Last instant the accumulator was brought current.
    pub last_update_time: Timestamp,
    /// Cumulative reward per unit of liquidity, scaled by [`PRECISION`].
    pub reward_per_share_stored: u128,
    /// Inflows folded into epochs minus payouts. Doubles as the last seen
    /// balance for unseen-inflow detection.
    pub tracked_balance: Amount,
}

impl RewardStream {
    /// A stream registered at `now` with nothing distributed yet. The
    /// finished zero-length epoch leaves the first inflow free to fold.
    pub fn register(now: Timestamp) -> Self {
        RewardStream {
            period_finish: now,
            reward_rate: 0,
            last_update_time: now,
            reward_per_share_stored: 0,
            tracked_balance: 0,
        }
    }

    /// Accrual horizon: `min(now, period_finish)`.
    pub fn applicable_until(&self, now: Timestamp) -> Timestamp {
        now.min(self.period_finish)
    }

    /// Accumulator value as of `now` without committing it. With no
    /// liquidity the stored value holds; the elapsed interval's rewards
    /// stay undistributed.
    pub fn reward_per_share_at(
        &self,
        now: Timestamp,
        liquidity_supply: Amount,
    ) -> Result<u128, TreasuryError> {
        if liquidity_supply == 0 {
            return Ok(self.reward_per_share_stored);
        }
        let until = self.applicable_until(now);
        if until <= self.last_update_time {
            return Ok(self.reward_per_share_stored);
        }
        let elapsed = (until - self.last_update_time) as u128;
        let accrued = elapsed
            .checked_mul(self.reward_rate)
            .and_then(|v| v.checked_div(liquidity_supply))
            .ok_or(TreasuryError::ArithmeticOverflow)?;
        self.reward_per_share_stored
            .checked_add(accrued)
            .ok_or(TreasuryError::ArithmeticOverflow)
    }

    /// Commit the accumulator and advance `last_update_time` to the
    /// accrual horizon. Run before any rate change or payout.
    pub fn settle(&mut self, now: Timestamp, liquidity_supply: Amount) -> Result<(), TreasuryError> {
        self.reward_per_share_stored = self.reward_per_share_at(now, liquidity_supply)?;
        let until = self.applicable_until(now);
        if until > self.last_update_time {
            self.last_update_time = until;
        }
        Ok(())
    }

    /// Scaled per-second rate for a fresh epoch starting at `now`,
    /// blending in the undistributed remainder of an epoch still in
    /// progress. Pure: pairs with [`RewardStream::apply_epoch`].
    pub fn epoch_rate(&self, now: Timestamp, reward: Amount) -> Result<u128, TreasuryError> {
        let total = if now >= self.period_finish {
            reward
        } else {
            let remaining = (self.period_finish - now) as u128;
            let leftover = mul_div(remaining, self.reward_rate, PRECISION)
                .ok_or(TreasuryError::ArithmeticOverflow)?;
            reward
                .checked_add(leftover)
                .ok_or(TreasuryError::ArithmeticOverflow)?
        };
        mul_div(total, PRECISION, REWARDS_DURATION as u128)
            .ok_or(TreasuryError::ArithmeticOverflow)
    }

    /// Start a fresh epoch at `now` with a rate from
    /// [`RewardStream::epoch_rate`], adding the folded inflow to the
    /// tracked balance.
    pub fn apply_epoch(&mut self, now: Timestamp, rate: u128, reward: Amount) {
        self.reward_rate = rate;
        self.last_update_time = now;
        self.period_finish = now + REWARDS_DURATION;
        self.tracked_balance = self.tracked_balance.saturating_add(reward);
    }
}

/// An account's snapshot against one stream.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct StreamAccount {
    /// Accumulator value already credited to this account.
    pub reward_per_share_paid: u128,
    /// Settled but unpaid rewards.
    pub accrued: Amount,
}

/// Reward earned by `locked` weight between two accumulator values.
pub fn stream_earned(
    locked: Amount,
    per_share: u128,
    per_share_paid: u128,
) -> Result<Amount, TreasuryError> {
    let delta = per_share
        .checked_sub(per_share_paid)
        .ok_or(TreasuryError::ArithmeticOverflow)?;
    mul_div(locked, delta, PRECISION).ok_or(TreasuryError::ArithmeticOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TOKEN: u128 = 1_000_000_000_000_000_000;

    // --- epoch rate ---

    #[test]
    fn epoch_rate_is_precision_scaled() {
        let stream = RewardStream::register(0);
        // 1000e18 over the 7-day epoch truncates below one token-per-
        // second at this scale; the scaled rate keeps the remainder.
        let rate = stream.epoch_rate(0, 1_000 * TOKEN).unwrap();
        assert_eq!(rate, 1_653_439_153_439_153_439_153_439_153);
    }

    #[test]
    fn fold_after_finish_takes_no_leftover() {
        let mut stream = RewardStream::register(0);
        let rate = stream.epoch_rate(0, 604_800).unwrap();
        stream.apply_epoch(0, rate, 604_800);
        assert_eq!(stream.reward_rate, PRECISION);
        // The epoch ran to completion; a second fold starts clean.
        let next = stream.epoch_rate(REWARDS_DURATION, 604_800).unwrap();
        assert_eq!(next, PRECISION);
    }

    #[test]
    fn mid_epoch_fold_blends_the_remainder() {
        let mut stream = RewardStream::register(0);
        let rate = stream.epoch_rate(0, 604_800).unwrap();
        stream.apply_epoch(0, rate, 604_800);
        // Halfway through, half the tokens are still undistributed.
        // Folding in exactly that much keeps the rate at one per second.
        let half = REWARDS_DURATION / 2;
        let blended = stream.epoch_rate(half, 302_400).unwrap();
        assert_eq!(blended, PRECISION);
    }

    // --- accumulator ---

    #[test]
    fn accrual_clamps_at_period_finish() {
        let mut stream = RewardStream::register(0);
        let rate = stream.epoch_rate(0, 1_000 * TOKEN).unwrap();
        stream.apply_epoch(0, rate, 1_000 * TOKEN);
        let at_finish = stream.reward_per_share_at(REWARDS_DURATION, 300).unwrap();
        let long_after = stream
            .reward_per_share_at(REWARDS_DURATION * 10, 300)
            .unwrap();
        assert_eq!(at_finish, long_after);
        assert_eq!(stream.applicable_until(REWARDS_DURATION * 10), REWARDS_DURATION);
    }

    #[test]
    fn zero_supply_settles_time_but_no_rewards() {
        let mut stream = RewardStream::register(0);
        let rate = stream.epoch_rate(0, 1_000 * TOKEN).unwrap();
        stream.apply_epoch(0, rate, 1_000 * TOKEN);
        stream.settle(1_000, 0).unwrap();
        assert_eq!(stream.reward_per_share_stored, 0);
        // The elapsed interval is consumed, not deferred: liquidity
        // arriving later is not paid for the idle stretch.
        assert_eq!(stream.last_update_time, 1_000);
    }

    #[test]
    fn thirds_split_is_exact() {
        // Two lockers with weights 100 and 200 share a 1000e18 inflow
        // over a full epoch: payouts land on exact thirds, truncated.
        let mut stream = RewardStream::register(0);
        let rate = stream.epoch_rate(0, 1_000 * TOKEN).unwrap();
        stream.apply_epoch(0, rate, 1_000 * TOKEN);
        let per_share = stream.reward_per_share_at(REWARDS_DURATION, 300).unwrap();
        assert_eq!(
            stream_earned(100, per_share, 0),
            Ok(333_333_333_333_333_333_333)
        );
        assert_eq!(
            stream_earned(200, per_share, 0),
            Ok(666_666_666_666_666_666_666)
        );
    }

    #[test]
    fn earned_is_zero_at_paid_marker() {
        assert_eq!(stream_earned(500, 7 * PRECISION, 7 * PRECISION), Ok(0));
        assert_eq!(stream_earned(0, 9 * PRECISION, 0), Ok(0));
    }

    proptest! {
        #[test]
        fn accumulator_is_monotone_in_time(
            offset in 0u64..=2 * REWARDS_DURATION,
            extra in 0u64..=REWARDS_DURATION,
            reward in 1u128..=1_000_000 * TOKEN,
            supply in 1u128..=1_000_000,
        ) {
            let mut stream = RewardStream::register(0);
            let rate = stream.epoch_rate(0, reward).unwrap();
            stream.apply_epoch(0, rate, reward);
            let a = stream.reward_per_share_at(offset, supply).unwrap();
            let b = stream.reward_per_share_at(offset + extra, supply).unwrap();
            prop_assert!(b >= a);
        }

        #[test]
        fn distribution_never_exceeds_the_inflow(
            reward in 1u128..=1_000_000 * TOKEN,
            supply in 1u128..=1_000_000,
            elapsed in 0u64..=2 * REWARDS_DURATION,
        ) {
            // Paying the whole supply at the accrued per-share value can
            // never exceed the folded inflow.
            let mut stream = RewardStream::register(0);
            let rate = stream.epoch_rate(0, reward).unwrap();
            stream.apply_epoch(0, rate, reward);
            let per_share = stream.reward_per_share_at(elapsed, supply).unwrap();
            let paid = stream_earned(supply, per_share, 0).unwrap();
            prop_assert!(paid <= reward);
        }
    }
}
