//! Vesting tranches and the early-exit penalty split.
//!
//! Every reward mint opens a tranche that vests [`VESTING_DURATION`]
//! after creation. Withdrawing early forfeits half of each still-vesting
//! tranche; withdrawal always consumes every tranche, vested or not.

use serde::{Deserialize, Serialize};

use weir_core::types::{Amount, Timestamp};

/// One mint event's worth of reward with its own vesting clock.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct EarningsTranche {
    pub amount: Amount,
    pub unlocks_at: Timestamp,
}

impl EarningsTranche {
    pub fn is_vested(&self, now: Timestamp) -> bool {
        self.unlocks_at <= now
    }
}

/// Still-vesting tranches and their sum.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct EarnedBalances {
    pub tranches: Vec<EarningsTranche>,
    pub total: Amount,
}

/// What a withdrawal at a given instant would pay and forfeit.
///
/// `amount` is obtainable now: vested tranches in full plus half of each
/// still-vesting tranche. `penalty_amount` is the half forfeited;
/// `amount_without_penalty` the vested part alone. Odd unvested amounts
/// floor on both sides, leaving the odd unit in treasury custody.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct WithdrawableBalance {
    pub amount: Amount,
    pub penalty_amount: Amount,
    pub amount_without_penalty: Amount,
}

/// Tranches still vesting at `now`. A waiver (public exit) vests
/// everything, so nothing is still earning.
pub fn earned_view(tranches: &[EarningsTranche], now: Timestamp, waived: bool) -> EarnedBalances {
    let mut balances = EarnedBalances::default();
    if waived {
        return balances;
    }
    for tranche in tranches {
        if !tranche.is_vested(now) {
            balances.tranches.push(*tranche);
            balances.total = balances.total.saturating_add(tranche.amount);
        }
    }
    balances
}

/// Split tranches into the withdrawable/penalty totals at `now`.
pub fn withdrawable_split(
    tranches: &[EarningsTranche],
    now: Timestamp,
    waived: bool,
) -> WithdrawableBalance {
    let mut balance = WithdrawableBalance::default();
    for tranche in tranches {
        if waived || tranche.is_vested(now) {
            balance.amount = balance.amount.saturating_add(tranche.amount);
            balance.amount_without_penalty = balance
                .amount_without_penalty
                .saturating_add(tranche.amount);
        } else {
            let half = tranche.amount / 2;
            balance.amount = balance.amount.saturating_add(half);
            balance.penalty_amount = balance.penalty_amount.saturating_add(half);
        }
    }
    balance
}
