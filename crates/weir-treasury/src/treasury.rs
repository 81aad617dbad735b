//! The treasury engine: position lock ledger, multi-asset reward
//! distribution, and vesting of minted protocol rewards.
//!
//! Every operation settles the affected account's reward streams before
//! touching balances, and every fallible operation validates and computes
//! first, then commits; a failed call leaves the treasury as it found it.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use weir_core::constants::{
    BPS_PRECISION, LOCK_DURATION, MAX_TEAM_FEE_BPS, VESTING_DURATION,
};
use weir_core::custody::PositionStore;
use weir_core::error::{StoreError, TreasuryError, WeirError};
use weir_core::math::mul_div;
use weir_core::store::TokenStore;
use weir_core::traits::RewardMinter;
use weir_core::types::{Address, Amount, AssetId, PositionId, Timestamp};

use crate::position::{
    liquidity_of, locked_weight, AccountLiquidity, LockedPosition, PositionTemplate, PositionView,
};
use crate::stream::{stream_earned, RewardStream, StreamAccount};
use crate::vesting::{
    earned_view, withdrawable_split, EarnedBalances, EarningsTranche, WithdrawableBalance,
};

/// A settled stream snapshot staged for commit.
///
/// `stage_settlement` computes one of these per registered stream without
/// touching state; `commit_settlement` writes them back after every other
/// validation has passed.
struct StagedStream {
    asset: AssetId,
    per_share: u128,
    until: Timestamp,
    settled: StreamAccount,
}

/// Lock-and-vest treasury.
///
/// Deposited collateral positions stay in treasury custody for
/// [`LOCK_DURATION`]; while locked (and only while locked) their weight
/// earns a share of every registered reward stream. Minted protocol
/// rewards vest over [`VESTING_DURATION`] with a half penalty on early
/// withdrawal. Enabling public exit is a one-way wind-down switch that
/// releases all positions and waives vesting.
#[derive(Debug)]
pub struct Treasury {
    owner: Address,
    custody: Address,
    vault: Address,
    protocol_token: AssetId,
    template: PositionTemplate,
    incentives_controller: Option<Address>,
    minters: Vec<Address>,
    team_reward_fee_bps: u64,
    team_reward_vault: Address,
    public_exit: bool,
    exit_delegates: HashMap<Address, Address>,
    positions: HashMap<Address, Vec<LockedPosition>>,
    liquidity_supply: Amount,
    streams: HashMap<AssetId, RewardStream>,
    stream_order: Vec<AssetId>,
    stream_accounts: HashMap<(AssetId, Address), StreamAccount>,
    tranches: HashMap<Address, Vec<EarningsTranche>>,
}

impl Treasury {
    /// A treasury with the protocol token's reward stream registered and
    /// the team fee off. The team vault defaults to the owner.
    pub fn new(
        now: Timestamp,
        owner: Address,
        custody: Address,
        vault: Address,
        protocol_token: AssetId,
        template: PositionTemplate,
    ) -> Result<Self, TreasuryError> {
        if owner.is_zero()
            || custody.is_zero()
            || vault.is_zero()
            || protocol_token.is_zero()
            || template.asset0.is_zero()
            || template.asset1.is_zero()
        {
            return Err(TreasuryError::ZeroAddress);
        }
        let mut streams = HashMap::new();
        streams.insert(protocol_token, RewardStream::register(now));
        Ok(Treasury {
            owner,
            custody,
            vault,
            protocol_token,
            template,
            incentives_controller: None,
            minters: Vec::new(),
            team_reward_fee_bps: 0,
            team_reward_vault: owner,
            public_exit: false,
            exit_delegates: HashMap::new(),
            positions: HashMap::new(),
            liquidity_supply: 0,
            streams,
            stream_order: vec![protocol_token],
            stream_accounts: HashMap::new(),
            tranches: HashMap::new(),
        })
    }

    // ------------------------------------------------------------------
    // Stream settlement plumbing
    // ------------------------------------------------------------------

    /// Weight of `account`'s still-locked positions. Expired-but-held
    /// positions keep diluting the global supply but earn nothing.
    fn locked_liquidity(&self, now: Timestamp, account: Address) -> Amount {
        self.positions
            .get(&account)
            .map(|held| locked_weight(held, now))
            .unwrap_or(0)
    }

    /// Bring every registered stream current for `account` without
    /// committing anything.
    fn stage_settlement(
        &self,
        now: Timestamp,
        account: Address,
    ) -> Result<Vec<StagedStream>, TreasuryError> {
        let locked = self.locked_liquidity(now, account);
        let mut staged = Vec::with_capacity(self.stream_order.len());
        for &asset in &self.stream_order {
            let Some(stream) = self.streams.get(&asset) else {
                continue;
            };
            let per_share = stream.reward_per_share_at(now, self.liquidity_supply)?;
            let prior = self
                .stream_accounts
                .get(&(asset, account))
                .copied()
                .unwrap_or_default();
            let delta = stream_earned(locked, per_share, prior.reward_per_share_paid)?;
            let accrued = prior
                .accrued
                .checked_add(delta)
                .ok_or(TreasuryError::ArithmeticOverflow)?;
            staged.push(StagedStream {
                asset,
                per_share,
                until: stream.applicable_until(now),
                settled: StreamAccount {
                    reward_per_share_paid: per_share,
                    accrued,
                },
            });
        }
        Ok(staged)
    }

    fn commit_settlement(&mut self, account: Address, staged: Vec<StagedStream>) {
        for entry in staged {
            if let Some(stream) = self.streams.get_mut(&entry.asset) {
                stream.reward_per_share_stored = entry.per_share;
                if entry.until > stream.last_update_time {
                    stream.last_update_time = entry.until;
                }
            }
            self.stream_accounts
                .insert((entry.asset, account), entry.settled);
        }
    }

    // ------------------------------------------------------------------
    // Position lock ledger
    // ------------------------------------------------------------------

    /// Lock `ids` for [`LOCK_DURATION`], taking custody of each position.
    ///
    /// Every position must conform to the current template and be held by
    /// the caller. Validation runs before any custody transfer; a rejected
    /// id leaves the whole call without effect.
    pub fn lock(
        &mut self,
        positions: &mut dyn PositionStore,
        now: Timestamp,
        caller: Address,
        ids: &[PositionId],
    ) -> Result<(), WeirError> {
        let staged = self.stage_settlement(now, caller)?;

        let mut seen = HashSet::new();
        let mut added: Amount = 0;
        let mut incoming = Vec::with_capacity(ids.len());
        for &id in ids {
            if !seen.insert(id) {
                return Err(StoreError::NotHolder {
                    position: id.to_string(),
                    expected: caller.to_string(),
                }
                .into());
            }
            let meta = positions.metadata(id)?;
            self.template.validate(id, &meta)?;
            let holder = positions.holder(id)?;
            if holder != caller {
                return Err(StoreError::NotHolder {
                    position: id.to_string(),
                    expected: caller.to_string(),
                }
                .into());
            }
            added = added
                .checked_add(meta.weight)
                .ok_or(TreasuryError::ArithmeticOverflow)?;
            incoming.push(LockedPosition {
                id,
                weight: meta.weight,
                locked_at: now,
                unlocks_at: now + LOCK_DURATION,
            });
        }
        let new_supply = self
            .liquidity_supply
            .checked_add(added)
            .ok_or(TreasuryError::ArithmeticOverflow)?;

        self.commit_settlement(caller, staged);
        for position in &incoming {
            positions.transfer(position.id, caller, self.custody)?;
            debug!(account = %caller, position = %position.id, weight = position.weight, "position locked");
        }
        let count = incoming.len();
        self.positions.entry(caller).or_default().extend(incoming);
        self.liquidity_supply = new_supply;
        info!(account = %caller, count, added, "positions locked");
        Ok(())
    }

    /// Release every expired position the caller holds (every position,
    /// once public exit is enabled). Returns the number released.
    pub fn withdraw_expired(
        &mut self,
        positions: &mut dyn PositionStore,
        now: Timestamp,
        caller: Address,
    ) -> Result<usize, WeirError> {
        let staged = self.stage_settlement(now, caller)?;
        self.commit_settlement(caller, staged);

        let releasable: Vec<LockedPosition> = self
            .positions
            .get(&caller)
            .map(|held| {
                held.iter()
                    .filter(|p| self.public_exit || !p.is_locked(now))
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        if releasable.is_empty() {
            return Ok(0);
        }
        self.release(positions, caller, &releasable)?;
        info!(account = %caller, count = releasable.len(), "expired positions released");
        Ok(releasable.len())
    }

    /// Release the listed positions. Any id the caller does not hold
    /// here, or that is still time-locked while public exit is off,
    /// rejects the whole call.
    pub fn withdraw_positions(
        &mut self,
        positions: &mut dyn PositionStore,
        now: Timestamp,
        caller: Address,
        ids: &[PositionId],
    ) -> Result<(), WeirError> {
        let staged = self.stage_settlement(now, caller)?;

        let held = self.positions.get(&caller);
        let mut seen = HashSet::new();
        let mut chosen = Vec::with_capacity(ids.len());
        for &id in ids {
            if !seen.insert(id) {
                return Err(TreasuryError::PositionNotLocked(id.to_string()).into());
            }
            let position = held
                .and_then(|list| list.iter().find(|p| p.id == id))
                .copied()
                .ok_or_else(|| TreasuryError::PositionNotLocked(id.to_string()))?;
            if position.is_locked(now) && !self.public_exit {
                return Err(TreasuryError::PositionNotLocked(id.to_string()).into());
            }
            chosen.push(position);
        }

        self.commit_settlement(caller, staged);
        self.release(positions, caller, &chosen)?;
        info!(account = %caller, count = chosen.len(), "positions released");
        Ok(())
    }

    /// Force-release every position of each listed account back to it.
    /// Owner-gated and only available once public exit is enabled.
    pub fn kick(
        &mut self,
        positions: &mut dyn PositionStore,
        now: Timestamp,
        caller: Address,
        accounts: &[Address],
    ) -> Result<(), WeirError> {
        if caller != self.owner {
            return Err(TreasuryError::NotOwner.into());
        }
        if !self.public_exit {
            return Err(TreasuryError::PublicExitDisabled.into());
        }
        if accounts.iter().any(Address::is_zero) {
            return Err(TreasuryError::ZeroAddress.into());
        }
        for &account in accounts {
            let staged = self.stage_settlement(now, account)?;
            self.commit_settlement(account, staged);
            let held = self.positions.get(&account).cloned().unwrap_or_default();
            if held.is_empty() {
                continue;
            }
            self.release(positions, account, &held)?;
            warn!(account = %account, count = held.len(), "account kicked");
        }
        Ok(())
    }

    /// Return custody of `releasing` to `account` and shrink the ledger.
    fn release(
        &mut self,
        positions: &mut dyn PositionStore,
        account: Address,
        releasing: &[LockedPosition],
    ) -> Result<(), WeirError> {
        let mut freed: Amount = 0;
        for position in releasing {
            positions.transfer(position.id, self.custody, account)?;
            freed = freed.saturating_add(position.weight);
        }
        if let Some(held) = self.positions.get_mut(&account) {
            held.retain(|p| !releasing.iter().any(|r| r.id == p.id));
            if held.is_empty() {
                self.positions.remove(&account);
            }
        }
        self.liquidity_supply = self.liquidity_supply.saturating_sub(freed);
        Ok(())
    }

    /// Total, still-locked, and unlockable weight for `account`.
    pub fn account_liquidity(&self, now: Timestamp, account: Address) -> AccountLiquidity {
        self.positions
            .get(&account)
            .map(|held| liquidity_of(held, now))
            .unwrap_or_default()
    }

    pub fn account_all_positions(&self, account: Address) -> Vec<PositionView> {
        self.positions
            .get(&account)
            .map(|held| held.iter().map(PositionView::from).collect())
            .unwrap_or_default()
    }

    pub fn account_locked_positions(&self, now: Timestamp, account: Address) -> Vec<PositionView> {
        self.positions
            .get(&account)
            .map(|held| {
                held.iter()
                    .filter(|p| p.is_locked(now))
                    .map(PositionView::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn account_unlockable_positions(
        &self,
        now: Timestamp,
        account: Address,
    ) -> Vec<PositionView> {
        self.positions
            .get(&account)
            .map(|held| {
                held.iter()
                    .filter(|p| !p.is_locked(now))
                    .map(PositionView::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Weight a position would lock at, after template validation.
    pub fn position_weight(
        &self,
        positions: &dyn PositionStore,
        id: PositionId,
    ) -> Result<Amount, WeirError> {
        let meta = positions.metadata(id)?;
        self.template.validate(id, &meta)?;
        Ok(meta.weight)
    }

    // ------------------------------------------------------------------
    // Reward streams
    // ------------------------------------------------------------------

    /// Register a reward stream for `asset`. Owner-gated; the protocol
    /// token's stream exists from construction.
    pub fn add_reward(
        &mut self,
        now: Timestamp,
        caller: Address,
        asset: AssetId,
    ) -> Result<(), TreasuryError> {
        if caller != self.owner {
            return Err(TreasuryError::NotOwner);
        }
        if asset.is_zero() {
            return Err(TreasuryError::ZeroAddress);
        }
        if self.streams.contains_key(&asset) {
            return Err(TreasuryError::RewardAssetExists(asset.to_string()));
        }
        self.streams.insert(asset, RewardStream::register(now));
        self.stream_order.push(asset);
        info!(asset = %asset, "reward stream registered");
        Ok(())
    }

    /// Settle all streams for the caller, fold any unseen inflow of the
    /// requested assets into a fresh epoch (only once the previous epoch
    /// has finished), and pay out the caller's accrued share minus the
    /// team-fee skim.
    ///
    /// The protocol token is excluded from unseen-inflow detection: its
    /// custody balance co-mingles with vesting tranches, so its stream is
    /// fed exclusively by [`Treasury::mint`] to the treasury itself.
    pub fn get_reward(
        &mut self,
        tokens: &mut dyn TokenStore,
        now: Timestamp,
        caller: Address,
        assets: &[AssetId],
    ) -> Result<(), WeirError> {
        for asset in assets {
            if !self.streams.contains_key(asset) {
                return Err(TreasuryError::UnknownRewardAsset(asset.to_string()).into());
            }
        }
        let staged = self.stage_settlement(now, caller)?;
        self.commit_settlement(caller, staged);

        let mut seen = HashSet::new();
        for &asset in assets {
            if !seen.insert(asset) {
                continue;
            }
            if asset != self.protocol_token {
                self.fold_unseen_inflow(tokens, now, asset)?;
            }
            self.pay_accrued(tokens, now, asset, caller)?;
        }
        Ok(())
    }

    /// Fold any balance that arrived outside [`Treasury::mint`] into a
    /// fresh epoch. Gated on the previous epoch being over; a mid-epoch
    /// inflow just waits.
    fn fold_unseen_inflow(
        &mut self,
        tokens: &mut dyn TokenStore,
        now: Timestamp,
        asset: AssetId,
    ) -> Result<(), WeirError> {
        let Some(stream) = self.streams.get(&asset) else {
            return Ok(());
        };
        let external = tokens.balance_of(asset, self.custody);
        let unseen = external.saturating_sub(stream.tracked_balance);
        if unseen == 0 || now < stream.period_finish {
            return Ok(());
        }
        let rate = stream.epoch_rate(now, unseen)?;
        if let Some(stream) = self.streams.get_mut(&asset) {
            stream.apply_epoch(now, rate, unseen);
        }
        debug!(asset = %asset, amount = unseen, "unseen inflow folded into a fresh epoch");
        Ok(())
    }

    /// Pay `account`'s settled accrual in `asset`, skimming the team fee.
    /// A fee that truncates to zero is not transferred.
    fn pay_accrued(
        &mut self,
        tokens: &mut dyn TokenStore,
        now: Timestamp,
        asset: AssetId,
        account: Address,
    ) -> Result<(), WeirError> {
        let key = (asset, account);
        let accrued = self
            .stream_accounts
            .get(&key)
            .map(|a| a.accrued)
            .unwrap_or(0);
        if accrued == 0 {
            return Ok(());
        }
        let fee = mul_div(accrued, self.team_reward_fee_bps as u128, BPS_PRECISION)
            .ok_or(TreasuryError::ArithmeticOverflow)?;
        let have = tokens.balance_of(asset, self.custody);
        if have < accrued {
            return Err(StoreError::InsufficientBalance {
                asset: asset.to_string(),
                have,
                need: accrued,
            }
            .into());
        }
        if fee > 0 {
            tokens.transfer(asset, self.custody, self.team_reward_vault, fee)?;
        }
        tokens.transfer(asset, self.custody, account, accrued - fee)?;
        if let Some(entry) = self.stream_accounts.get_mut(&key) {
            entry.accrued = 0;
        }
        if let Some(stream) = self.streams.get_mut(&asset) {
            stream.tracked_balance = stream.tracked_balance.saturating_sub(accrued);
        }
        info!(asset = %asset, account = %account, paid = accrued - fee, fee, at = now, "reward paid");
        Ok(())
    }

    /// Virtual accrual per registered stream, in registration order.
    /// Never folds unseen inflows; repeated calls return the same values.
    pub fn claimable_rewards(
        &self,
        now: Timestamp,
        account: Address,
    ) -> Result<Vec<(AssetId, Amount)>, TreasuryError> {
        let locked = self.locked_liquidity(now, account);
        let mut out = Vec::with_capacity(self.stream_order.len());
        for &asset in &self.stream_order {
            let Some(stream) = self.streams.get(&asset) else {
                continue;
            };
            let per_share = stream.reward_per_share_at(now, self.liquidity_supply)?;
            let prior = self
                .stream_accounts
                .get(&(asset, account))
                .copied()
                .unwrap_or_default();
            let delta = stream_earned(locked, per_share, prior.reward_per_share_paid)?;
            let total = prior
                .accrued
                .checked_add(delta)
                .ok_or(TreasuryError::ArithmeticOverflow)?;
            out.push((asset, total));
        }
        Ok(out)
    }

    /// `min(now, period_finish)` for `asset`'s stream.
    pub fn last_time_reward_applicable(
        &self,
        now: Timestamp,
        asset: AssetId,
    ) -> Result<Timestamp, TreasuryError> {
        self.streams
            .get(&asset)
            .map(|stream| stream.applicable_until(now))
            .ok_or_else(|| TreasuryError::UnknownRewardAsset(asset.to_string()))
    }

    // ------------------------------------------------------------------
    // Vesting
    // ------------------------------------------------------------------

    /// Mint `amount` of the protocol token to `to`, pulling the tokens
    /// from the vault into treasury custody.
    ///
    /// Minting to the treasury itself feeds the protocol reward stream
    /// directly, bypassing the epoch gate (a running epoch's remainder is
    /// blended into the new rate). Minting to anyone else opens a vesting
    /// tranche unlocking at `now + VESTING_DURATION`; back-to-back mints
    /// in the same second merge into one tranche.
    pub fn mint(
        &mut self,
        tokens: &mut dyn TokenStore,
        now: Timestamp,
        caller: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), WeirError> {
        if !self.minters.contains(&caller) {
            return Err(TreasuryError::NotMinter.into());
        }
        if to.is_zero() {
            return Err(TreasuryError::ZeroAddress.into());
        }
        if amount == 0 {
            return Ok(());
        }
        if to == self.custody {
            let stream = self
                .streams
                .get(&self.protocol_token)
                .copied()
                .ok_or_else(|| {
                    TreasuryError::UnknownRewardAsset(self.protocol_token.to_string())
                })?;
            let per_share = stream.reward_per_share_at(now, self.liquidity_supply)?;
            let until = stream.applicable_until(now);
            let rate = stream.epoch_rate(now, amount)?;
            tokens.transfer(self.protocol_token, self.vault, self.custody, amount)?;
            if let Some(stream) = self.streams.get_mut(&self.protocol_token) {
                stream.reward_per_share_stored = per_share;
                if until > stream.last_update_time {
                    stream.last_update_time = until;
                }
                stream.apply_epoch(now, rate, amount);
            }
            info!(amount, at = now, "minted into the protocol reward stream");
        } else {
            tokens.transfer(self.protocol_token, self.vault, self.custody, amount)?;
            let unlocks_at = now + VESTING_DURATION;
            let tranches = self.tranches.entry(to).or_default();
            match tranches.last_mut() {
                Some(last) if last.unlocks_at == unlocks_at => {
                    last.amount = last.amount.saturating_add(amount);
                }
                _ => tranches.push(EarningsTranche { amount, unlocks_at }),
            }
            info!(account = %to, amount, unlocks_at, "vesting tranche minted");
        }
        Ok(())
    }

    /// Unexpired tranches and their total. Empty once public exit has
    /// waived vesting.
    pub fn earned_balances(&self, now: Timestamp, account: Address) -> EarnedBalances {
        let tranches = self
            .tranches
            .get(&account)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        earned_view(tranches, now, self.public_exit)
    }

    /// What a withdrawal right now would pay, split into the penalty-free
    /// part and the penalty taken from unvested tranches.
    pub fn withdrawable_balance(&self, now: Timestamp, account: Address) -> WithdrawableBalance {
        let tranches = self
            .tranches
            .get(&account)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        withdrawable_split(tranches, now, self.public_exit)
    }

    /// Withdraw all earnings: vested tranches in full, unvested at half.
    /// Consumes every tranche; the penalty half stays in treasury custody.
    pub fn withdraw(
        &mut self,
        tokens: &mut dyn TokenStore,
        now: Timestamp,
        caller: Address,
    ) -> Result<Amount, WeirError> {
        self.settle_and_pay_out(tokens, now, caller)
    }

    /// [`Treasury::withdraw`] on behalf of `account`, callable by the
    /// account itself or its registered exit delegate. Pays the account.
    pub fn exit(
        &mut self,
        tokens: &mut dyn TokenStore,
        now: Timestamp,
        caller: Address,
        account: Address,
    ) -> Result<Amount, WeirError> {
        if caller != account && self.exit_delegates.get(&account) != Some(&caller) {
            return Err(TreasuryError::NotAuthorized.into());
        }
        self.settle_and_pay_out(tokens, now, account)
    }

    fn settle_and_pay_out(
        &mut self,
        tokens: &mut dyn TokenStore,
        now: Timestamp,
        account: Address,
    ) -> Result<Amount, WeirError> {
        let staged = self.stage_settlement(now, account)?;
        let balance = self.withdrawable_balance(now, account);
        self.commit_settlement(account, staged);
        if balance.amount > 0 {
            tokens.transfer(self.protocol_token, self.custody, account, balance.amount)?;
        }
        self.tranches.remove(&account);
        info!(
            account = %account,
            paid = balance.amount,
            penalty = balance.penalty_amount,
            "earnings withdrawn"
        );
        Ok(balance.amount)
    }

    /// Register `delegate` as the one address allowed to exit on the
    /// caller's behalf, replacing any previous delegate.
    pub fn delegate_exit(
        &mut self,
        caller: Address,
        delegate: Address,
    ) -> Result<(), TreasuryError> {
        if delegate.is_zero() {
            return Err(TreasuryError::ZeroAddress);
        }
        self.exit_delegates.insert(caller, delegate);
        debug!(account = %caller, delegate = %delegate, "exit delegate set");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Swap the template future locks are validated against. Positions
    /// already locked are unaffected.
    pub fn set_position_template(
        &mut self,
        caller: Address,
        template: PositionTemplate,
    ) -> Result<(), TreasuryError> {
        if caller != self.owner {
            return Err(TreasuryError::NotOwner);
        }
        if template.asset0.is_zero() || template.asset1.is_zero() {
            return Err(TreasuryError::ZeroAddress);
        }
        self.template = template;
        info!("position template replaced");
        Ok(())
    }

    pub fn set_team_reward_vault(
        &mut self,
        caller: Address,
        vault: Address,
    ) -> Result<(), TreasuryError> {
        if caller != self.owner {
            return Err(TreasuryError::NotOwner);
        }
        if vault.is_zero() {
            return Err(TreasuryError::ZeroAddress);
        }
        self.team_reward_vault = vault;
        Ok(())
    }

    /// Set the team fee, capped at [`MAX_TEAM_FEE_BPS`].
    pub fn set_team_reward_fee(&mut self, caller: Address, bps: u64) -> Result<(), TreasuryError> {
        if caller != self.owner {
            return Err(TreasuryError::NotOwner);
        }
        if bps > MAX_TEAM_FEE_BPS {
            return Err(TreasuryError::FeeTooHigh {
                got: bps,
                max: MAX_TEAM_FEE_BPS,
            });
        }
        self.team_reward_fee_bps = bps;
        info!(bps, "team reward fee set");
        Ok(())
    }

    /// Replace the whole minter set.
    pub fn set_minters(&mut self, caller: Address, minters: &[Address]) -> Result<(), TreasuryError> {
        if caller != self.owner {
            return Err(TreasuryError::NotOwner);
        }
        if minters.iter().any(Address::is_zero) {
            return Err(TreasuryError::ZeroAddress);
        }
        self.minters = minters.to_vec();
        info!(count = self.minters.len(), "minters replaced");
        Ok(())
    }

    /// Record which emission controller the [`RewardMinter`] seam mints
    /// for. The controller must also be in the minter set to mint.
    pub fn set_incentives_controller(
        &mut self,
        caller: Address,
        controller: Address,
    ) -> Result<(), TreasuryError> {
        if caller != self.owner {
            return Err(TreasuryError::NotOwner);
        }
        if controller.is_zero() {
            return Err(TreasuryError::ZeroAddress);
        }
        self.incentives_controller = Some(controller);
        Ok(())
    }

    /// One-way wind-down switch: every position becomes releasable and
    /// vesting is waived. Cannot be turned back off.
    pub fn enable_public_exit(&mut self, caller: Address) -> Result<(), TreasuryError> {
        if caller != self.owner {
            return Err(TreasuryError::NotOwner);
        }
        if self.public_exit {
            return Err(TreasuryError::PublicExitAlreadyEnabled);
        }
        self.public_exit = true;
        warn!("public exit enabled");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn custody(&self) -> Address {
        self.custody
    }

    pub fn vault(&self) -> Address {
        self.vault
    }

    pub fn protocol_token(&self) -> AssetId {
        self.protocol_token
    }

    pub fn position_template(&self) -> &PositionTemplate {
        &self.template
    }

    pub fn liquidity_supply(&self) -> Amount {
        self.liquidity_supply
    }

    pub fn team_reward_fee(&self) -> u64 {
        self.team_reward_fee_bps
    }

    pub fn team_reward_vault(&self) -> Address {
        self.team_reward_vault
    }

    pub fn public_exit_enabled(&self) -> bool {
        self.public_exit
    }

    pub fn incentives_controller(&self) -> Option<Address> {
        self.incentives_controller
    }

    pub fn minters(&self) -> &[Address] {
        &self.minters
    }

    /// Registered reward assets, protocol token first.
    pub fn reward_assets(&self) -> &[AssetId] {
        &self.stream_order
    }

    pub fn reward_stream(&self, asset: AssetId) -> Option<&RewardStream> {
        self.streams.get(&asset)
    }
}

/// Mint seam for emission claims.
///
/// The emission ledger hands a clamped claim here; the treasury books it
/// as the incentives controller calling [`Treasury::mint`], so the
/// controller address must be registered and in the minter set.
impl RewardMinter for Treasury {
    fn mint(
        &mut self,
        tokens: &mut dyn TokenStore,
        now: Timestamp,
        to: Address,
        amount: Amount,
    ) -> Result<(), WeirError> {
        let caller = self
            .incentives_controller
            .ok_or(TreasuryError::NotMinter)?;
        Treasury::mint(self, tokens, now, caller, to, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weir_core::constants::{PRECISION, REWARDS_DURATION, SECONDS_PER_DAY};
    use weir_core::custody::{MemoryPositionStore, PositionMetadata};
    use weir_core::store::MemoryTokenStore;

    const TOKEN: u128 = 1_000_000_000_000_000_000;
    const DAY: u64 = SECONDS_PER_DAY;

    fn addr(seed: u8) -> Address {
        Address([seed; 32])
    }

    fn owner() -> Address {
        addr(0xA0)
    }

    fn custody() -> Address {
        addr(0xC1)
    }

    fn vault() -> Address {
        addr(0xB0)
    }

    fn minter() -> Address {
        addr(0x77)
    }

    fn uwu() -> AssetId {
        addr(0x11)
    }

    fn dai() -> AssetId {
        addr(0x22)
    }

    fn alice() -> Address {
        addr(1)
    }

    fn bob() -> Address {
        addr(2)
    }

    fn template() -> PositionTemplate {
        PositionTemplate::new(addr(0x41), addr(0x42), 3_000, -60_000, -30_000)
    }

    fn conforming(weight: Amount) -> PositionMetadata {
        PositionMetadata {
            asset0: addr(0x41),
            asset1: addr(0x42),
            fee_tier: 3_000,
            lower_bound: -57_800,
            upper_bound: -35_000,
            weight,
        }
    }

    fn treasury() -> Treasury {
        Treasury::new(0, owner(), custody(), vault(), uwu(), template()).unwrap()
    }

    /// Treasury with a registered minter and a funded protocol vault.
    fn funded() -> (Treasury, MemoryTokenStore) {
        let mut t = treasury();
        t.set_minters(owner(), &[minter()]).unwrap();
        let mut tokens = MemoryTokenStore::new();
        tokens.credit(uwu(), vault(), 1_000_000 * TOKEN);
        (t, tokens)
    }

    fn lock_one(
        t: &mut Treasury,
        store: &mut MemoryPositionStore,
        now: Timestamp,
        who: Address,
        id: u64,
        weight: Amount,
    ) {
        store.insert(PositionId(id), who, conforming(weight));
        t.lock(store, now, who, &[PositionId(id)]).unwrap();
    }

    // --- construction ---

    #[test]
    fn new_rejects_zero_identities() {
        let t = template();
        assert_eq!(
            Treasury::new(0, Address::ZERO, custody(), vault(), uwu(), t).unwrap_err(),
            TreasuryError::ZeroAddress
        );
        assert_eq!(
            Treasury::new(0, owner(), Address::ZERO, vault(), uwu(), t).unwrap_err(),
            TreasuryError::ZeroAddress
        );
        assert_eq!(
            Treasury::new(0, owner(), custody(), Address::ZERO, uwu(), t).unwrap_err(),
            TreasuryError::ZeroAddress
        );
        assert_eq!(
            Treasury::new(0, owner(), custody(), vault(), Address::ZERO, t).unwrap_err(),
            TreasuryError::ZeroAddress
        );
        let bad = PositionTemplate::new(Address::ZERO, addr(0x42), 3_000, -60_000, -30_000);
        assert_eq!(
            Treasury::new(0, owner(), custody(), vault(), uwu(), bad).unwrap_err(),
            TreasuryError::ZeroAddress
        );
    }

    #[test]
    fn protocol_stream_exists_from_construction() {
        let t = treasury();
        assert_eq!(t.reward_assets(), &[uwu()]);
        let stream = t.reward_stream(uwu()).unwrap();
        assert_eq!(stream.period_finish, 0);
        assert_eq!(stream.reward_rate, 0);
        assert_eq!(t.team_reward_vault(), owner());
        assert_eq!(t.team_reward_fee(), 0);
    }

    // --- position locking ---

    #[test]
    fn lock_takes_custody_and_counts_liquidity() {
        let mut t = treasury();
        let mut store = MemoryPositionStore::new();
        lock_one(&mut t, &mut store, 100, alice(), 1, 500 * TOKEN);

        assert_eq!(store.holder(PositionId(1)).unwrap(), custody());
        assert_eq!(t.liquidity_supply(), 500 * TOKEN);
        let liq = t.account_liquidity(100, alice());
        assert_eq!(liq.total, 500 * TOKEN);
        assert_eq!(liq.locked, 500 * TOKEN);
        assert_eq!(liq.unlockable, 0);
        let views = t.account_all_positions(alice());
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].unlocks_at, 100 + LOCK_DURATION);
    }

    #[test]
    fn lock_rejects_template_mismatch() {
        let mut t = treasury();
        let mut store = MemoryPositionStore::new();
        let mut meta = conforming(500);
        meta.fee_tier = 10_000;
        store.insert(PositionId(1), alice(), meta);

        let err = t.lock(&mut store, 0, alice(), &[PositionId(1)]).unwrap_err();
        assert_eq!(
            err,
            WeirError::Treasury(TreasuryError::InvalidFeeTier {
                got: 10_000,
                want: 3_000
            })
        );
        assert_eq!(store.holder(PositionId(1)).unwrap(), alice());
        assert_eq!(t.liquidity_supply(), 0);
    }

    #[test]
    fn lock_rejects_a_position_held_by_someone_else() {
        let mut t = treasury();
        let mut store = MemoryPositionStore::new();
        store.insert(PositionId(1), bob(), conforming(500));

        let err = t.lock(&mut store, 0, alice(), &[PositionId(1)]).unwrap_err();
        assert!(matches!(err, WeirError::Store(StoreError::NotHolder { .. })));
        assert_eq!(t.liquidity_supply(), 0);
    }

    #[test]
    fn lock_rejects_duplicate_ids_in_one_call() {
        let mut t = treasury();
        let mut store = MemoryPositionStore::new();
        store.insert(PositionId(1), alice(), conforming(500));

        let err = t
            .lock(&mut store, 0, alice(), &[PositionId(1), PositionId(1)])
            .unwrap_err();
        assert!(matches!(err, WeirError::Store(StoreError::NotHolder { .. })));
        assert_eq!(store.holder(PositionId(1)).unwrap(), alice());
        assert_eq!(t.liquidity_supply(), 0);
    }

    #[test]
    fn lock_sums_weights_across_positions() {
        let mut t = treasury();
        let mut store = MemoryPositionStore::new();
        store.insert(PositionId(1), alice(), conforming(300));
        store.insert(PositionId(2), alice(), conforming(700));

        t.lock(&mut store, 0, alice(), &[PositionId(1), PositionId(2)])
            .unwrap();
        assert_eq!(t.liquidity_supply(), 1_000);
        assert_eq!(t.account_all_positions(alice()).len(), 2);
    }

    // --- position release ---

    #[test]
    fn withdraw_expired_is_a_no_op_before_expiry() {
        let mut t = treasury();
        let mut store = MemoryPositionStore::new();
        lock_one(&mut t, &mut store, 0, alice(), 1, 500);

        let released = t
            .withdraw_expired(&mut store, LOCK_DURATION - 1, alice())
            .unwrap();
        assert_eq!(released, 0);
        assert_eq!(store.holder(PositionId(1)).unwrap(), custody());
        assert_eq!(t.liquidity_supply(), 500);
    }

    #[test]
    fn withdraw_expired_releases_at_the_boundary() {
        let mut t = treasury();
        let mut store = MemoryPositionStore::new();
        lock_one(&mut t, &mut store, 0, alice(), 1, 500);

        let released = t.withdraw_expired(&mut store, LOCK_DURATION, alice()).unwrap();
        assert_eq!(released, 1);
        assert_eq!(store.holder(PositionId(1)).unwrap(), alice());
        assert_eq!(t.liquidity_supply(), 0);
        assert!(t.account_all_positions(alice()).is_empty());
    }

    #[test]
    fn withdraw_positions_releases_an_expired_id() {
        let mut t = treasury();
        let mut store = MemoryPositionStore::new();
        lock_one(&mut t, &mut store, 0, alice(), 1, 500);
        lock_one(&mut t, &mut store, 10 * DAY, alice(), 2, 300);

        t.withdraw_positions(&mut store, LOCK_DURATION, alice(), &[PositionId(1)])
            .unwrap();
        assert_eq!(store.holder(PositionId(1)).unwrap(), alice());
        assert_eq!(store.holder(PositionId(2)).unwrap(), custody());
        assert_eq!(t.liquidity_supply(), 300);
    }

    #[test]
    fn withdraw_positions_rejects_an_unheld_id() {
        let mut t = treasury();
        let mut store = MemoryPositionStore::new();
        lock_one(&mut t, &mut store, 0, alice(), 1, 500);

        let err = t
            .withdraw_positions(&mut store, LOCK_DURATION, alice(), &[PositionId(9)])
            .unwrap_err();
        assert!(matches!(
            err,
            WeirError::Treasury(TreasuryError::PositionNotLocked(_))
        ));
    }

    #[test]
    fn withdraw_positions_rejects_a_still_locked_id() {
        let mut t = treasury();
        let mut store = MemoryPositionStore::new();
        lock_one(&mut t, &mut store, 0, alice(), 1, 500);

        let err = t
            .withdraw_positions(&mut store, LOCK_DURATION - 1, alice(), &[PositionId(1)])
            .unwrap_err();
        assert!(matches!(
            err,
            WeirError::Treasury(TreasuryError::PositionNotLocked(_))
        ));
        assert_eq!(store.holder(PositionId(1)).unwrap(), custody());
    }

    #[test]
    fn public_exit_releases_everything_early() {
        let mut t = treasury();
        let mut store = MemoryPositionStore::new();
        lock_one(&mut t, &mut store, 0, alice(), 1, 500);

        t.enable_public_exit(owner()).unwrap();
        let released = t.withdraw_expired(&mut store, 1, alice()).unwrap();
        assert_eq!(released, 1);
        assert_eq!(store.holder(PositionId(1)).unwrap(), alice());
    }

    // --- liquidity views ---

    #[test]
    fn liquidity_views_split_on_expiry() {
        let mut t = treasury();
        let mut store = MemoryPositionStore::new();
        lock_one(&mut t, &mut store, 0, alice(), 1, 500);
        lock_one(&mut t, &mut store, 10 * DAY, alice(), 2, 300);

        // First lock has just expired, second still has 10 days to run.
        let now = LOCK_DURATION;
        let liq = t.account_liquidity(now, alice());
        assert_eq!(liq.total, 800);
        assert_eq!(liq.locked, 300);
        assert_eq!(liq.unlockable, 500);
        assert_eq!(t.account_locked_positions(now, alice()).len(), 1);
        assert_eq!(t.account_locked_positions(now, alice())[0].id, PositionId(2));
        assert_eq!(
            t.account_unlockable_positions(now, alice())[0].id,
            PositionId(1)
        );
        assert_eq!(t.account_all_positions(alice()).len(), 2);
    }

    #[test]
    fn position_weight_probes_the_template() {
        let mut store = MemoryPositionStore::new();
        store.insert(PositionId(1), alice(), conforming(420));
        let mut bad = conforming(9);
        bad.lower_bound = -70_000;
        store.insert(PositionId(2), alice(), bad);

        let t = treasury();
        assert_eq!(t.position_weight(&store, PositionId(1)).unwrap(), 420);
        let err = t.position_weight(&store, PositionId(2)).unwrap_err();
        assert!(matches!(
            err,
            WeirError::Treasury(TreasuryError::LowerBoundOutOfRange { .. })
        ));
    }

    // --- reward streams ---

    #[test]
    fn mint_to_self_starts_the_protocol_epoch() {
        let (mut t, mut tokens) = funded();
        t.mint(&mut tokens, 1_000, minter(), custody(), 1_000 * TOKEN)
            .unwrap();

        let stream = t.reward_stream(uwu()).unwrap();
        assert_eq!(stream.reward_rate, 1_653_439_153_439_153_439_153_439_153);
        assert_eq!(stream.period_finish, 1_000 + REWARDS_DURATION);
        assert_eq!(stream.tracked_balance, 1_000 * TOKEN);
        assert_eq!(tokens.balance_of(uwu(), custody()), 1_000 * TOKEN);
        assert_eq!(
            tokens.balance_of(uwu(), vault()),
            1_000_000 * TOKEN - 1_000 * TOKEN
        );
    }

    #[test]
    fn mid_epoch_mint_blends_the_remainder() {
        let (mut t, mut tokens) = funded();
        t.mint(&mut tokens, 0, minter(), custody(), 604_800).unwrap();
        assert_eq!(t.reward_stream(uwu()).unwrap().reward_rate, PRECISION);

        // Half the epoch left: 302_400 undistributed units blend with the
        // new 302_400 to hold the rate at one unit per second.
        t.mint(&mut tokens, 302_400, minter(), custody(), 302_400)
            .unwrap();
        let stream = t.reward_stream(uwu()).unwrap();
        assert_eq!(stream.reward_rate, PRECISION);
        assert_eq!(stream.period_finish, 302_400 + REWARDS_DURATION);
        assert_eq!(stream.tracked_balance, 907_200);
    }

    #[test]
    fn sole_locker_collects_both_streams() {
        let (mut t, mut tokens) = funded();
        let mut store = MemoryPositionStore::new();
        t.add_reward(0, owner(), dai()).unwrap();
        lock_one(&mut t, &mut store, 0, alice(), 1, 100 * TOKEN);

        t.mint(&mut tokens, 0, minter(), custody(), 1_000 * TOKEN)
            .unwrap();
        tokens.credit(dai(), custody(), 2_000 * TOKEN);
        // Poke folds the dai inflow into a fresh epoch.
        t.get_reward(&mut tokens, 0, alice(), &[dai()]).unwrap();
        assert_eq!(t.reward_stream(dai()).unwrap().tracked_balance, 2_000 * TOKEN);

        t.get_reward(&mut tokens, REWARDS_DURATION, alice(), &[uwu(), dai()])
            .unwrap();
        assert_eq!(
            tokens.balance_of(uwu(), alice()),
            999_999_999_999_900_000_000
        );
        assert_eq!(
            tokens.balance_of(dai(), alice()),
            1_999_999_999_999_900_000_000
        );
    }

    #[test]
    fn rewards_split_by_locked_weight() {
        let (mut t, mut tokens) = funded();
        let mut store = MemoryPositionStore::new();
        t.add_reward(0, owner(), dai()).unwrap();
        lock_one(&mut t, &mut store, 0, alice(), 1, 100);
        lock_one(&mut t, &mut store, 0, bob(), 2, 200);

        t.mint(&mut tokens, 0, minter(), custody(), 1_000 * TOKEN)
            .unwrap();
        tokens.credit(dai(), custody(), 2_000 * TOKEN);
        t.get_reward(&mut tokens, 0, alice(), &[dai()]).unwrap();

        let now = REWARDS_DURATION;
        t.get_reward(&mut tokens, now, alice(), &[uwu(), dai()]).unwrap();
        t.get_reward(&mut tokens, now, bob(), &[uwu(), dai()]).unwrap();

        assert_eq!(tokens.balance_of(uwu(), alice()), 333_333_333_333_333_333_333);
        assert_eq!(tokens.balance_of(uwu(), bob()), 666_666_666_666_666_666_666);
        assert_eq!(tokens.balance_of(dai(), alice()), 666_666_666_666_666_666_666);
        assert_eq!(tokens.balance_of(dai(), bob()), 1_333_333_333_333_333_333_333);
    }

    #[test]
    fn unseen_inflow_waits_for_the_epoch_gate() {
        let (mut t, mut tokens) = funded();
        let mut store = MemoryPositionStore::new();
        t.add_reward(0, owner(), dai()).unwrap();
        lock_one(&mut t, &mut store, 0, alice(), 1, 100);

        tokens.credit(dai(), custody(), 2_000 * TOKEN);
        t.get_reward(&mut tokens, 0, alice(), &[dai()]).unwrap();
        let first_finish = t.reward_stream(dai()).unwrap().period_finish;

        // A mid-epoch inflow is seen but not folded.
        tokens.credit(dai(), custody(), 500 * TOKEN);
        t.get_reward(&mut tokens, 3 * DAY, alice(), &[dai()]).unwrap();
        let stream = t.reward_stream(dai()).unwrap();
        assert_eq!(stream.period_finish, first_finish);

        // Once the epoch is over the pending inflow folds, on top of
        // whatever the first epoch could not distribute exactly.
        t.get_reward(&mut tokens, REWARDS_DURATION, alice(), &[dai()])
            .unwrap();
        let stream = t.reward_stream(dai()).unwrap();
        assert_eq!(stream.period_finish, REWARDS_DURATION + REWARDS_DURATION);
        assert!(stream.reward_rate > 0);
    }

    #[test]
    fn expired_position_stops_earning_but_still_dilutes() {
        let (mut t, mut tokens) = funded();
        let mut store = MemoryPositionStore::new();
        lock_one(&mut t, &mut store, 0, alice(), 1, 100);
        lock_one(&mut t, &mut store, LOCK_DURATION, bob(), 2, 100);

        // Alice's lock expired exactly when the epoch starts; her weight
        // still sits in the supply until withdrawn.
        t.mint(&mut tokens, LOCK_DURATION, minter(), custody(), 1_000 * TOKEN)
            .unwrap();
        let now = LOCK_DURATION + REWARDS_DURATION;
        let alice_claims = t.claimable_rewards(now, alice()).unwrap();
        let bob_claims = t.claimable_rewards(now, bob()).unwrap();
        assert_eq!(alice_claims[0], (uwu(), 0));
        assert_eq!(bob_claims[0], (uwu(), 499_999_999_999_999_999_999));
    }

    #[test]
    fn zero_supply_interval_distributes_nothing() {
        let (mut t, mut tokens) = funded();
        let mut store = MemoryPositionStore::new();
        t.mint(&mut tokens, 0, minter(), custody(), 1_000 * TOKEN)
            .unwrap();

        // Nobody locked during the whole epoch.
        lock_one(&mut t, &mut store, REWARDS_DURATION, alice(), 1, 100);
        let claims = t
            .claimable_rewards(2 * REWARDS_DURATION, alice())
            .unwrap();
        assert_eq!(claims[0], (uwu(), 0));
    }

    #[test]
    fn claimable_matches_the_paid_amount() {
        let (mut t, mut tokens) = funded();
        let mut store = MemoryPositionStore::new();
        lock_one(&mut t, &mut store, 0, alice(), 1, 100);
        t.mint(&mut tokens, 0, minter(), custody(), 1_000 * TOKEN)
            .unwrap();

        let now = REWARDS_DURATION;
        let expected = t.claimable_rewards(now, alice()).unwrap()[0].1;
        assert!(expected > 0);
        t.get_reward(&mut tokens, now, alice(), &[uwu()]).unwrap();
        assert_eq!(tokens.balance_of(uwu(), alice()), expected);
        // Settled and paid: nothing left claimable.
        assert_eq!(t.claimable_rewards(now, alice()).unwrap()[0].1, 0);
    }

    #[test]
    fn last_time_reward_applicable_clamps_at_the_finish() {
        let (mut t, mut tokens) = funded();
        t.mint(&mut tokens, 0, minter(), custody(), 604_800).unwrap();
        assert_eq!(t.last_time_reward_applicable(3 * DAY, uwu()).unwrap(), 3 * DAY);
        assert_eq!(
            t.last_time_reward_applicable(REWARDS_DURATION + 5, uwu()).unwrap(),
            REWARDS_DURATION
        );
        assert!(matches!(
            t.last_time_reward_applicable(0, dai()),
            Err(TreasuryError::UnknownRewardAsset(_))
        ));
    }

    #[test]
    fn add_reward_is_owner_gated_and_unique() {
        let mut t = treasury();
        assert_eq!(
            t.add_reward(0, alice(), dai()).unwrap_err(),
            TreasuryError::NotOwner
        );
        assert_eq!(
            t.add_reward(0, owner(), Address::ZERO).unwrap_err(),
            TreasuryError::ZeroAddress
        );
        t.add_reward(0, owner(), dai()).unwrap();
        assert!(matches!(
            t.add_reward(0, owner(), dai()).unwrap_err(),
            TreasuryError::RewardAssetExists(_)
        ));
        assert_eq!(t.reward_assets(), &[uwu(), dai()]);
    }

    #[test]
    fn get_reward_rejects_an_unknown_asset() {
        let mut t = treasury();
        let mut tokens = MemoryTokenStore::new();
        let err = t.get_reward(&mut tokens, 0, alice(), &[dai()]).unwrap_err();
        assert!(matches!(
            err,
            WeirError::Treasury(TreasuryError::UnknownRewardAsset(_))
        ));
    }

    // --- team fee ---

    #[test]
    fn team_fee_skims_the_payout() {
        let (mut t, mut tokens) = funded();
        let mut store = MemoryPositionStore::new();
        let team = addr(0xEE);
        t.set_team_reward_vault(owner(), team).unwrap();
        t.set_team_reward_fee(owner(), 1_000).unwrap();
        lock_one(&mut t, &mut store, 0, alice(), 1, 100 * TOKEN);
        t.mint(&mut tokens, 0, minter(), custody(), 1_000 * TOKEN)
            .unwrap();

        t.get_reward(&mut tokens, REWARDS_DURATION, alice(), &[uwu()])
            .unwrap();
        // Accrued 999_999_999_999_900_000_000, skimmed at 10%.
        assert_eq!(tokens.balance_of(uwu(), team), 99_999_999_999_990_000_000);
        assert_eq!(tokens.balance_of(uwu(), alice()), 899_999_999_999_910_000_000);
    }

    #[test]
    fn dust_fee_rounds_to_zero_and_is_suppressed() {
        let (mut t, mut tokens) = funded();
        let mut store = MemoryPositionStore::new();
        let team = addr(0xEE);
        t.set_team_reward_vault(owner(), team).unwrap();
        t.set_team_reward_fee(owner(), 100).unwrap();
        lock_one(&mut t, &mut store, 0, alice(), 1, 100);
        t.mint(&mut tokens, 0, minter(), custody(), 90).unwrap();

        t.get_reward(&mut tokens, REWARDS_DURATION, alice(), &[uwu()])
            .unwrap();
        // 89 units accrued; a 1% fee truncates to zero and is skipped.
        assert_eq!(tokens.balance_of(uwu(), alice()), 89);
        assert_eq!(tokens.balance_of(uwu(), team), 0);
    }

    // --- vesting ---

    #[test]
    fn mint_opens_a_tranche_and_pulls_from_the_vault() {
        let (mut t, mut tokens) = funded();
        t.mint(&mut tokens, 1_000, minter(), alice(), 500 * TOKEN)
            .unwrap();

        assert_eq!(tokens.balance_of(uwu(), custody()), 500 * TOKEN);
        let earned = t.earned_balances(1_000, alice());
        assert_eq!(earned.total, 500 * TOKEN);
        assert_eq!(earned.tranches.len(), 1);
        assert_eq!(earned.tranches[0].unlocks_at, 1_000 + VESTING_DURATION);
    }

    #[test]
    fn same_second_mints_merge_into_one_tranche() {
        let (mut t, mut tokens) = funded();
        t.mint(&mut tokens, 50, minter(), alice(), 100).unwrap();
        t.mint(&mut tokens, 50, minter(), alice(), 200).unwrap();
        t.mint(&mut tokens, 51, minter(), alice(), 300).unwrap();

        let earned = t.earned_balances(51, alice());
        assert_eq!(earned.tranches.len(), 2);
        assert_eq!(earned.tranches[0].amount, 300);
        assert_eq!(earned.tranches[1].amount, 300);
        assert_eq!(earned.total, 600);
    }

    #[test]
    fn vested_withdraw_pays_in_full() {
        let (mut t, mut tokens) = funded();
        t.mint(&mut tokens, 0, minter(), alice(), 1_000 * TOKEN).unwrap();

        let now = VESTING_DURATION;
        let balance = t.withdrawable_balance(now, alice());
        assert_eq!(balance.amount, 1_000 * TOKEN);
        assert_eq!(balance.penalty_amount, 0);
        assert_eq!(balance.amount_without_penalty, 1_000 * TOKEN);

        let paid = t.withdraw(&mut tokens, now, alice()).unwrap();
        assert_eq!(paid, 1_000 * TOKEN);
        assert_eq!(tokens.balance_of(uwu(), alice()), 1_000 * TOKEN);
        assert_eq!(t.withdraw(&mut tokens, now, alice()).unwrap(), 0);
    }

    #[test]
    fn early_withdraw_halves_and_strands_the_penalty() {
        let (mut t, mut tokens) = funded();
        t.mint(&mut tokens, 0, minter(), alice(), 1_000 * TOKEN).unwrap();

        let now = 7 * DAY;
        let balance = t.withdrawable_balance(now, alice());
        assert_eq!(balance.amount, 500 * TOKEN);
        assert_eq!(balance.penalty_amount, 500 * TOKEN);
        assert_eq!(balance.amount_without_penalty, 0);

        let paid = t.withdraw(&mut tokens, now, alice()).unwrap();
        assert_eq!(paid, 500 * TOKEN);
        assert_eq!(tokens.balance_of(uwu(), alice()), 500 * TOKEN);
        // The forfeited half never leaves treasury custody, and the
        // tranches are gone: vesting out the clock recovers nothing.
        assert_eq!(tokens.balance_of(uwu(), custody()), 500 * TOKEN);
        assert_eq!(t.withdrawable_balance(VESTING_DURATION, alice()).amount, 0);
    }

    #[test]
    fn mint_is_minter_gated() {
        let (mut t, mut tokens) = funded();
        let err = t
            .mint(&mut tokens, 0, alice(), alice(), 100)
            .unwrap_err();
        assert_eq!(err, WeirError::Treasury(TreasuryError::NotMinter));

        let err = t
            .mint(&mut tokens, 0, minter(), Address::ZERO, 100)
            .unwrap_err();
        assert_eq!(err, WeirError::Treasury(TreasuryError::ZeroAddress));

        // Zero amount is a silent no-op: nothing moves.
        t.mint(&mut tokens, 0, minter(), alice(), 0).unwrap();
        assert_eq!(tokens.balance_of(uwu(), vault()), 1_000_000 * TOKEN);
        assert_eq!(t.earned_balances(0, alice()).total, 0);
    }

    #[test]
    fn reward_minter_seam_mints_via_the_controller() {
        let (mut t, mut tokens) = funded();
        // No controller registered: the seam cannot mint.
        let err = RewardMinter::mint(&mut t, &mut tokens, 0, alice(), 100).unwrap_err();
        assert_eq!(err, WeirError::Treasury(TreasuryError::NotMinter));

        let controller = addr(0x99);
        t.set_incentives_controller(owner(), controller).unwrap();
        // Registered but not a minter: still rejected.
        let err = RewardMinter::mint(&mut t, &mut tokens, 0, alice(), 100).unwrap_err();
        assert_eq!(err, WeirError::Treasury(TreasuryError::NotMinter));

        t.set_minters(owner(), &[minter(), controller]).unwrap();
        RewardMinter::mint(&mut t, &mut tokens, 0, alice(), 100).unwrap();
        assert_eq!(t.earned_balances(0, alice()).total, 100);
    }

    // --- exit and delegation ---

    #[test]
    fn exit_by_delegate_pays_the_account() {
        let (mut t, mut tokens) = funded();
        let carol = addr(3);
        t.mint(&mut tokens, 0, minter(), alice(), 1_000).unwrap();
        t.delegate_exit(alice(), carol).unwrap();

        let paid = t.exit(&mut tokens, VESTING_DURATION, carol, alice()).unwrap();
        assert_eq!(paid, 1_000);
        assert_eq!(tokens.balance_of(uwu(), alice()), 1_000);
        assert_eq!(tokens.balance_of(uwu(), carol), 0);
    }

    #[test]
    fn exit_rejects_strangers() {
        let (mut t, mut tokens) = funded();
        t.mint(&mut tokens, 0, minter(), alice(), 1_000).unwrap();

        let err = t.exit(&mut tokens, 0, bob(), alice()).unwrap_err();
        assert_eq!(err, WeirError::Treasury(TreasuryError::NotAuthorized));
        // An account may always exit itself.
        t.exit(&mut tokens, 0, alice(), alice()).unwrap();
    }

    #[test]
    fn delegate_replacement_revokes_the_old_one() {
        let (mut t, mut tokens) = funded();
        let carol = addr(3);
        let dave = addr(4);
        t.mint(&mut tokens, 0, minter(), alice(), 1_000).unwrap();

        assert_eq!(
            t.delegate_exit(alice(), Address::ZERO).unwrap_err(),
            TreasuryError::ZeroAddress
        );
        t.delegate_exit(alice(), carol).unwrap();
        t.delegate_exit(alice(), dave).unwrap();
        let err = t.exit(&mut tokens, 0, carol, alice()).unwrap_err();
        assert_eq!(err, WeirError::Treasury(TreasuryError::NotAuthorized));
        t.exit(&mut tokens, 0, dave, alice()).unwrap();
    }

    // --- public exit and kick ---

    #[test]
    fn public_exit_waives_vesting() {
        let (mut t, mut tokens) = funded();
        t.mint(&mut tokens, 0, minter(), alice(), 1_000 * TOKEN).unwrap();
        t.enable_public_exit(owner()).unwrap();

        let balance = t.withdrawable_balance(0, alice());
        assert_eq!(balance.amount, 1_000 * TOKEN);
        assert_eq!(balance.penalty_amount, 0);
        assert!(t.earned_balances(0, alice()).tranches.is_empty());

        let paid = t.withdraw(&mut tokens, 0, alice()).unwrap();
        assert_eq!(paid, 1_000 * TOKEN);
    }

    #[test]
    fn enable_public_exit_is_one_way_and_owner_gated() {
        let mut t = treasury();
        assert_eq!(
            t.enable_public_exit(alice()).unwrap_err(),
            TreasuryError::NotOwner
        );
        t.enable_public_exit(owner()).unwrap();
        assert!(t.public_exit_enabled());
        assert_eq!(
            t.enable_public_exit(owner()).unwrap_err(),
            TreasuryError::PublicExitAlreadyEnabled
        );
    }

    #[test]
    fn kick_forces_positions_back_to_the_depositor() {
        let mut t = treasury();
        let mut store = MemoryPositionStore::new();
        lock_one(&mut t, &mut store, 0, alice(), 1, 500);
        lock_one(&mut t, &mut store, 0, bob(), 2, 300);

        t.enable_public_exit(owner()).unwrap();
        t.kick(&mut store, 10, owner(), &[alice(), bob()]).unwrap();
        assert_eq!(store.holder(PositionId(1)).unwrap(), alice());
        assert_eq!(store.holder(PositionId(2)).unwrap(), bob());
        assert_eq!(t.liquidity_supply(), 0);
    }

    #[test]
    fn kick_is_gated() {
        let mut t = treasury();
        let mut store = MemoryPositionStore::new();
        lock_one(&mut t, &mut store, 0, alice(), 1, 500);

        let err = t.kick(&mut store, 0, alice(), &[alice()]).unwrap_err();
        assert_eq!(err, WeirError::Treasury(TreasuryError::NotOwner));
        let err = t.kick(&mut store, 0, owner(), &[alice()]).unwrap_err();
        assert_eq!(err, WeirError::Treasury(TreasuryError::PublicExitDisabled));

        t.enable_public_exit(owner()).unwrap();
        let err = t
            .kick(&mut store, 0, owner(), &[alice(), Address::ZERO])
            .unwrap_err();
        assert_eq!(err, WeirError::Treasury(TreasuryError::ZeroAddress));
        // The zero-address check runs before anything is released.
        assert_eq!(store.holder(PositionId(1)).unwrap(), custody());
    }

    // --- administration ---

    #[test]
    fn team_fee_is_capped() {
        let mut t = treasury();
        assert_eq!(
            t.set_team_reward_fee(owner(), MAX_TEAM_FEE_BPS + 1).unwrap_err(),
            TreasuryError::FeeTooHigh {
                got: MAX_TEAM_FEE_BPS + 1,
                max: MAX_TEAM_FEE_BPS
            }
        );
        t.set_team_reward_fee(owner(), MAX_TEAM_FEE_BPS).unwrap();
        assert_eq!(t.team_reward_fee(), MAX_TEAM_FEE_BPS);
    }

    #[test]
    fn minters_replace_wholesale() {
        let (mut t, mut tokens) = funded();
        let other = addr(0x88);
        assert_eq!(t.minters(), &[minter()]);
        assert_eq!(
            t.set_minters(owner(), &[Address::ZERO]).unwrap_err(),
            TreasuryError::ZeroAddress
        );

        t.set_minters(owner(), &[other]).unwrap();
        assert_eq!(t.minters(), &[other]);
        let err = t.mint(&mut tokens, 0, minter(), alice(), 1).unwrap_err();
        assert_eq!(err, WeirError::Treasury(TreasuryError::NotMinter));
        t.mint(&mut tokens, 0, other, alice(), 1).unwrap();
    }

    #[test]
    fn admin_setters_are_owner_gated() {
        let mut t = treasury();
        assert_eq!(
            t.set_team_reward_vault(alice(), addr(0xEE)).unwrap_err(),
            TreasuryError::NotOwner
        );
        assert_eq!(
            t.set_team_reward_fee(alice(), 1).unwrap_err(),
            TreasuryError::NotOwner
        );
        assert_eq!(
            t.set_minters(alice(), &[alice()]).unwrap_err(),
            TreasuryError::NotOwner
        );
        assert_eq!(
            t.set_incentives_controller(alice(), alice()).unwrap_err(),
            TreasuryError::NotOwner
        );
        assert_eq!(
            t.set_position_template(alice(), template()).unwrap_err(),
            TreasuryError::NotOwner
        );
        assert_eq!(
            t.set_team_reward_vault(owner(), Address::ZERO).unwrap_err(),
            TreasuryError::ZeroAddress
        );
        assert_eq!(
            t.set_incentives_controller(owner(), Address::ZERO).unwrap_err(),
            TreasuryError::ZeroAddress
        );
        t.set_incentives_controller(owner(), addr(0x99)).unwrap();
        assert_eq!(t.incentives_controller(), Some(addr(0x99)));
    }

    #[test]
    fn replacing_the_template_changes_future_validation() {
        let mut t = treasury();
        let mut store = MemoryPositionStore::new();
        store.insert(PositionId(1), alice(), conforming(500));

        let narrow = PositionTemplate::new(addr(0x41), addr(0x42), 3_000, -50_000, -40_000);
        t.set_position_template(owner(), narrow).unwrap();
        let err = t.lock(&mut store, 0, alice(), &[PositionId(1)]).unwrap_err();
        assert!(matches!(
            err,
            WeirError::Treasury(TreasuryError::LowerBoundOutOfRange { .. })
        ));
    }
}
