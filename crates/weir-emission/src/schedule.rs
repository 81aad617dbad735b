//! Global emission schedule: rate, lifetime mint cap, and minted total.

use serde::{Deserialize, Serialize};

use weir_core::types::{Amount, Timestamp};

/// The engine-wide emission parameters.
///
/// A genesis engine is built with its schedule; a successor engine starts
/// with [`EmissionSchedule::default`] and adopts its predecessor's values,
/// minted total included, during the migration seed. The cap is a lifetime
/// clamp shared across the migration boundary, not a per-engine budget.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct EmissionSchedule {
    /// Instant emission began under this schedule.
    pub start_time: Timestamp,
    /// Global reward units emitted per second, split across pools by weight.
    pub rate_per_second: Amount,
    /// Reward units minted so far against the cap.
    pub minted_total: Amount,
    /// Lifetime ceiling on minted reward units.
    pub mint_cap: Amount,
}

impl EmissionSchedule {
    /// A fresh schedule with nothing minted yet.
    pub fn new(start_time: Timestamp, rate_per_second: Amount, mint_cap: Amount) -> Self {
        EmissionSchedule {
            start_time,
            rate_per_second,
            minted_total: 0,
            mint_cap,
        }
    }

    /// Headroom left under the cap.
    pub fn remaining(&self) -> Amount {
        self.mint_cap.saturating_sub(self.minted_total)
    }

    /// Clamp a requested payout to the remaining headroom.
    ///
    /// Claims against an exhausted cap settle accounting and pay zero
    /// rather than failing.
    pub fn clamp_mint(&self, requested: Amount) -> Amount {
        requested.min(self.remaining())
    }

    /// Record a payout already clamped by [`EmissionSchedule::clamp_mint`].
    pub fn record_mint(&mut self, amount: Amount) {
        self.minted_total = self.minted_total.saturating_add(amount);
        debug_assert!(self.minted_total <= self.mint_cap);
    }
}
