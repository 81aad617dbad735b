//! The emission ledger: pool registry, stake settlement, capped claims,
//! and the one-time seed from a predecessor engine.
//!
//! Every operation that can fail validates and computes first, then
//! commits; a failed call leaves the ledger exactly as it found it.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use weir_core::error::{EmissionError, WeirError};
use weir_core::store::TokenStore;
use weir_core::traits::{OnwardNotifier, RewardMinter};
use weir_core::types::{Address, Amount, AssetId, Timestamp};

use crate::pool::{attributed, pending_reward, RewardPool, UserStake};
use crate::schedule::EmissionSchedule;

/// Read surface a successor engine needs from the engine it replaces.
///
/// Both sides of a migration are ordinary [`EmissionLedger`]s; the trait
/// keeps the seam explicit and lets tests stand in doubles.
pub trait EmissionSource: Send + Sync {
    /// Schedule snapshot: start, rate, minted total, cap.
    fn schedule(&self) -> EmissionSchedule;

    /// Registered pools with their accrual state, in registration order.
    fn pool_snapshot(&self) -> Vec<(AssetId, RewardPool)>;

    /// The stake record this engine holds locally for `account` in
    /// `asset`, if any. Never consults a further predecessor: migration
    /// fallback is one hop deep.
    fn user_info(&self, asset: AssetId, account: Address) -> Option<UserStake>;
}

/// Pool registry and per-account emission accounting.
///
/// Assets report balance changes through [`notify_stake_change`]; accounts
/// pull accrued rewards through [`claim`]. A successor engine built with
/// [`with_predecessor`] reads un-migrated stake records straight from the
/// old engine until the owner adopts them here via any settlement.
///
/// [`notify_stake_change`]: EmissionLedger::notify_stake_change
/// [`claim`]: EmissionLedger::claim
/// [`with_predecessor`]: EmissionLedger::with_predecessor
pub struct EmissionLedger {
    configurator: Address,
    owner: Address,
    schedule: EmissionSchedule,
    seeded: bool,
    pools: HashMap<AssetId, RewardPool>,
    registered: Vec<AssetId>,
    total_allocation_weight: Amount,
    users: HashMap<(AssetId, Address), UserStake>,
    carryover: HashMap<Address, Amount>,
    claim_receivers: HashMap<Address, Address>,
    predecessor: Option<Box<dyn EmissionSource>>,
}

impl EmissionLedger {
    /// A genesis engine with its schedule fixed at construction.
    pub fn new(
        configurator: Address,
        owner: Address,
        schedule: EmissionSchedule,
    ) -> Result<Self, EmissionError> {
        if configurator.is_zero() || owner.is_zero() {
            return Err(EmissionError::ZeroAddress);
        }
        Ok(EmissionLedger {
            configurator,
            owner,
            schedule,
            seeded: true,
            pools: HashMap::new(),
            registered: Vec::new(),
            total_allocation_weight: 0,
            users: HashMap::new(),
            carryover: HashMap::new(),
            claim_receivers: HashMap::new(),
            predecessor: None,
        })
    }

    /// A successor engine. Its schedule stays empty until the owner runs
    /// [`EmissionLedger::seed_from_predecessor`].
    pub fn with_predecessor(
        configurator: Address,
        owner: Address,
        predecessor: Box<dyn EmissionSource>,
    ) -> Result<Self, EmissionError> {
        if configurator.is_zero() || owner.is_zero() {
            return Err(EmissionError::ZeroAddress);
        }
        Ok(EmissionLedger {
            configurator,
            owner,
            schedule: EmissionSchedule::default(),
            seeded: false,
            pools: HashMap::new(),
            registered: Vec::new(),
            total_allocation_weight: 0,
            users: HashMap::new(),
            carryover: HashMap::new(),
            claim_receivers: HashMap::new(),
            predecessor: Some(predecessor),
        })
    }

    /// Adopt the predecessor's schedule and pool registry. One-shot,
    /// owner-gated; chained notifiers are deliberately not carried over.
    pub fn seed_from_predecessor(&mut self, caller: Address) -> Result<(), EmissionError> {
        if caller != self.owner {
            return Err(EmissionError::NotOwner);
        }
        let predecessor = self
            .predecessor
            .as_ref()
            .ok_or(EmissionError::MissingPredecessor)?;
        if self.seeded {
            return Err(EmissionError::AlreadySeeded);
        }
        let schedule = predecessor.schedule();
        let snapshot = predecessor.pool_snapshot();
        let mut total = self.total_allocation_weight;
        for (asset, pool) in &snapshot {
            if self.pools.contains_key(asset) {
                return Err(EmissionError::PoolExists(asset.to_string()));
            }
            total = total
                .checked_add(pool.allocation_weight)
                .ok_or(EmissionError::ArithmeticOverflow)?;
        }
        self.schedule = schedule;
        for (asset, mut pool) in snapshot {
            pool.chained_notifier = None;
            self.registered.push(asset);
            self.pools.insert(asset, pool);
        }
        self.total_allocation_weight = total;
        self.seeded = true;
        info!(
            pools = self.registered.len(),
            minted = self.schedule.minted_total,
            "seeded from predecessor"
        );
        Ok(())
    }

    /// Register a staking asset with its allocation weight.
    pub fn register_pool(
        &mut self,
        now: Timestamp,
        caller: Address,
        asset: AssetId,
        allocation_weight: Amount,
    ) -> Result<(), EmissionError> {
        if caller != self.configurator {
            return Err(EmissionError::NotConfigurator);
        }
        if asset.is_zero() {
            return Err(EmissionError::ZeroAddress);
        }
        if self.pools.contains_key(&asset) {
            return Err(EmissionError::PoolExists(asset.to_string()));
        }
        self.total_allocation_weight = self
            .total_allocation_weight
            .checked_add(allocation_weight)
            .ok_or(EmissionError::ArithmeticOverflow)?;
        self.pools.insert(asset, RewardPool::new(allocation_weight, now));
        self.registered.push(asset);
        info!(asset = %asset, weight = allocation_weight, "registered pool");
        Ok(())
    }

    /// Settle `account` against the pool registered for the calling asset
    /// and record its new balance.
    ///
    /// `caller` is the asset reporting the change, `balance` the account's
    /// new staked balance and `total_supply` the asset's new total. Pools
    /// with a chained notifier forward the hop instead of banking pending
    /// locally; forwarded pending settles downstream, so banking it here
    /// would pay it twice.
    pub fn notify_stake_change(
        &mut self,
        onward: &mut dyn OnwardNotifier,
        now: Timestamp,
        caller: AssetId,
        account: Address,
        balance: Amount,
        total_supply: Amount,
    ) -> Result<(), WeirError> {
        let pool = self
            .pools
            .get(&caller)
            .ok_or_else(|| EmissionError::UnknownPool(caller.to_string()))?;
        let per_share =
            pool.per_share_at(now, self.schedule.rate_per_second, self.total_allocation_weight)?;
        let chained = pool.chained_notifier;
        let user = self.user_stake(caller, account);
        let pending = pending_reward(&user, per_share)?;
        let reward_debt = attributed(balance, per_share)?;

        if let Some(target) = chained {
            onward.notify(now, target, caller, account, user.staked_amount, total_supply)?;
        } else if pending > 0 {
            let entry = self.carryover.entry(account).or_default();
            *entry = entry
                .checked_add(pending)
                .ok_or(EmissionError::ArithmeticOverflow)?;
        }

        if let Some(pool) = self.pools.get_mut(&caller) {
            pool.apply_accrual(now, per_share);
            pool.total_staked = total_supply;
        }
        self.users.insert(
            (caller, account),
            UserStake {
                staked_amount: balance,
                reward_debt,
            },
        );
        debug!(asset = %caller, account = %account, balance, total_supply, "stake change settled");
        Ok(())
    }

    /// Pending reward per asset as of `now`, without settling anything.
    ///
    /// Banked carryover is not included; read it with
    /// [`EmissionLedger::carryover`].
    pub fn claimable_reward(
        &self,
        now: Timestamp,
        account: Address,
        assets: &[AssetId],
    ) -> Result<Vec<Amount>, EmissionError> {
        let mut out = Vec::with_capacity(assets.len());
        for &asset in assets {
            let pool = self
                .pools
                .get(&asset)
                .ok_or_else(|| EmissionError::UnknownPool(asset.to_string()))?;
            let per_share =
                pool.per_share_at(now, self.schedule.rate_per_second, self.total_allocation_weight)?;
            let user = self.user_stake(asset, account);
            out.push(pending_reward(&user, per_share)?);
        }
        Ok(out)
    }

    /// Settle the listed pools for `account`, add banked carryover, clamp
    /// to the remaining mint cap and pay out through `minter`.
    ///
    /// Callable by the account itself or the owner. Payout lands at the
    /// account's claim receiver when one is set. Returns the amount
    /// actually minted; accrual beyond the cap is settled and forfeited.
    pub fn claim(
        &mut self,
        minter: &mut dyn RewardMinter,
        tokens: &mut dyn TokenStore,
        now: Timestamp,
        caller: Address,
        account: Address,
        assets: &[AssetId],
    ) -> Result<Amount, WeirError> {
        if caller != account && caller != self.owner {
            return Err(EmissionError::NotAuthorized.into());
        }
        let mut total = self.carryover.get(&account).copied().unwrap_or(0);
        let mut staged: Vec<(AssetId, u128, Amount, Amount)> = Vec::with_capacity(assets.len());
        let mut seen = HashSet::new();
        for &asset in assets {
            // A repeated asset has nothing further pending once settled.
            if !seen.insert(asset) {
                continue;
            }
            let pool = self
                .pools
                .get(&asset)
                .ok_or_else(|| EmissionError::UnknownPool(asset.to_string()))?;
            let per_share = pool.per_share_at(
                now,
                self.schedule.rate_per_second,
                self.total_allocation_weight,
            )?;
            let user = self.user_stake(asset, account);
            let pending = pending_reward(&user, per_share)?;
            let reward_debt = attributed(user.staked_amount, per_share)?;
            total = total
                .checked_add(pending)
                .ok_or(EmissionError::ArithmeticOverflow)?;
            staged.push((asset, per_share, user.staked_amount, reward_debt));
        }
        let payout = self.schedule.clamp_mint(total);
        let receiver = self
            .claim_receivers
            .get(&account)
            .copied()
            .unwrap_or(account);
        if payout > 0 {
            minter.mint(tokens, now, receiver, payout)?;
        }
        self.carryover.remove(&account);
        for (asset, per_share, staked_amount, reward_debt) in staged {
            if let Some(pool) = self.pools.get_mut(&asset) {
                pool.apply_accrual(now, per_share);
            }
            self.users.insert(
                (asset, account),
                UserStake {
                    staked_amount,
                    reward_debt,
                },
            );
        }
        self.schedule.record_mint(payout);
        info!(account = %account, receiver = %receiver, payout, "claim settled");
        Ok(payout)
    }

    /// Re-weight a batch of pools. Each pool settles at its pre-batch
    /// weight first, so past accrual is unaffected. For a repeated asset
    /// the last weight wins.
    pub fn batch_set_allocation(
        &mut self,
        now: Timestamp,
        caller: Address,
        assets: &[AssetId],
        weights: &[Amount],
    ) -> Result<(), EmissionError> {
        if caller != self.owner {
            return Err(EmissionError::NotOwner);
        }
        if assets.len() != weights.len() {
            return Err(EmissionError::LengthMismatch {
                assets: assets.len(),
                weights: weights.len(),
            });
        }
        let mut staged: HashMap<AssetId, (u128, Amount, Amount)> = HashMap::new();
        for (&asset, &weight) in assets.iter().zip(weights) {
            let pool = self
                .pools
                .get(&asset)
                .ok_or_else(|| EmissionError::UnknownPool(asset.to_string()))?;
            let per_share = pool.per_share_at(
                now,
                self.schedule.rate_per_second,
                self.total_allocation_weight,
            )?;
            staged.insert(asset, (per_share, pool.allocation_weight, weight));
        }
        let mut total = self.total_allocation_weight;
        for (_, old_weight, new_weight) in staged.values() {
            total = total
                .checked_sub(*old_weight)
                .and_then(|t| t.checked_add(*new_weight))
                .ok_or(EmissionError::ArithmeticOverflow)?;
        }
        for (asset, (per_share, _, new_weight)) in staged {
            if let Some(pool) = self.pools.get_mut(&asset) {
                pool.apply_accrual(now, per_share);
                pool.allocation_weight = new_weight;
            }
        }
        self.total_allocation_weight = total;
        info!(pools = assets.len(), total_weight = total, "allocation weights updated");
        Ok(())
    }

    /// Point a pool's stake changes at a downstream accumulator, or clear
    /// the link with `None`.
    pub fn set_chained_notifier(
        &mut self,
        caller: Address,
        asset: AssetId,
        target: Option<AssetId>,
    ) -> Result<(), EmissionError> {
        if caller != self.owner {
            return Err(EmissionError::NotOwner);
        }
        if let Some(target) = target {
            if target.is_zero() {
                return Err(EmissionError::ZeroAddress);
            }
        }
        let pool = self
            .pools
            .get_mut(&asset)
            .ok_or_else(|| EmissionError::UnknownPool(asset.to_string()))?;
        pool.chained_notifier = target;
        info!(asset = %asset, "chained notifier updated");
        Ok(())
    }

    /// Redirect `account`'s claim payouts, or restore the default with
    /// `None`. Callable by the account itself or the owner.
    pub fn set_claim_receiver(
        &mut self,
        caller: Address,
        account: Address,
        receiver: Option<Address>,
    ) -> Result<(), EmissionError> {
        if caller != account && caller != self.owner {
            return Err(EmissionError::NotAuthorized);
        }
        match receiver {
            Some(receiver) if receiver.is_zero() => Err(EmissionError::ZeroAddress),
            Some(receiver) => {
                self.claim_receivers.insert(account, receiver);
                Ok(())
            }
            None => {
                self.claim_receivers.remove(&account);
                Ok(())
            }
        }
    }

    /// Stake record for `account` in `asset`: the local record once one
    /// exists, otherwise the predecessor's. Local presence alone ends the
    /// fallback, so a fully-exited (zero) record still shadows the old
    /// engine.
    pub fn user_stake(&self, asset: AssetId, account: Address) -> UserStake {
        match self.users.get(&(asset, account)) {
            Some(user) => *user,
            None => self
                .predecessor
                .as_ref()
                .and_then(|p| p.user_info(asset, account))
                .unwrap_or_default(),
        }
    }

    /// Pending reward banked by past settlements, paid on the next claim.
    pub fn carryover(&self, account: Address) -> Amount {
        self.carryover.get(&account).copied().unwrap_or(0)
    }

    pub fn schedule(&self) -> EmissionSchedule {
        self.schedule
    }

    pub fn pool(&self, asset: AssetId) -> Option<&RewardPool> {
        self.pools.get(&asset)
    }

    /// Registered assets in registration order.
    pub fn registered_assets(&self) -> &[AssetId] {
        &self.registered
    }

    pub fn pool_count(&self) -> usize {
        self.registered.len()
    }

    pub fn total_allocation_weight(&self) -> Amount {
        self.total_allocation_weight
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn configurator(&self) -> Address {
        self.configurator
    }
}

impl EmissionSource for EmissionLedger {
    fn schedule(&self) -> EmissionSchedule {
        self.schedule
    }

    fn pool_snapshot(&self) -> Vec<(AssetId, RewardPool)> {
        self.registered
            .iter()
            .filter_map(|asset| self.pools.get(asset).map(|pool| (*asset, pool.clone())))
            .collect()
    }

    fn user_info(&self, asset: AssetId, account: Address) -> Option<UserStake> {
        self.users.get(&(asset, account)).copied()
    }
}
