//! Shared fixtures for the integration suites.

use weir_core::custody::{MemoryPositionStore, PositionMetadata};
use weir_core::error::WeirError;
use weir_core::store::{MemoryTokenStore, TokenStore};
use weir_core::traits::RewardMinter;
use weir_core::types::{Address, Amount, AssetId, PositionId, Timestamp};
use weir_emission::{EmissionLedger, EmissionSchedule};
use weir_treasury::{PositionTemplate, Treasury};

pub const TOKEN: Amount = 1_000_000_000_000_000_000;
pub const DAY: u64 = 86_400;

/// Identity from a seed byte.
pub fn addr(seed: u8) -> Address {
    Address([seed; 32])
}

pub fn owner() -> Address {
    addr(0xA0)
}

pub fn configurator() -> Address {
    addr(0xC0)
}

/// The treasury's own custody identity.
pub fn custody() -> Address {
    addr(0xC1)
}

/// Vault the protocol token is minted out of.
pub fn vault() -> Address {
    addr(0xB0)
}

/// Protocol reward token.
pub fn uwu() -> AssetId {
    addr(0x11)
}

/// The template every conforming test position matches.
pub fn template() -> PositionTemplate {
    PositionTemplate::new(addr(0x41), addr(0x42), 3_000, -60_000, -30_000)
}

/// Metadata passing [`template`] validation with the given weight.
pub fn conforming(weight: Amount) -> PositionMetadata {
    PositionMetadata {
        asset0: addr(0x41),
        asset1: addr(0x42),
        fee_tier: 3_000,
        lower_bound: -57_800,
        upper_bound: -35_000,
        weight,
    }
}

/// An emission ledger emitting `rate` per second from time zero, with a
/// cap deep enough to never clamp.
pub fn ledger(rate: Amount) -> EmissionLedger {
    let schedule = EmissionSchedule::new(0, rate, u128::MAX / 2);
    EmissionLedger::new(configurator(), owner(), schedule).unwrap()
}

/// A treasury with the given minters registered and a funded protocol
/// vault.
pub fn treasury_with_vault(minters: &[Address]) -> (Treasury, MemoryTokenStore) {
    let mut treasury = Treasury::new(0, owner(), custody(), vault(), uwu(), template()).unwrap();
    treasury.set_minters(owner(), minters).unwrap();
    let mut tokens = MemoryTokenStore::new();
    tokens.credit(uwu(), vault(), 100_000_000 * TOKEN);
    (treasury, tokens)
}

/// Insert a conforming position for `account` and lock it.
pub fn lock_position(
    treasury: &mut Treasury,
    store: &mut MemoryPositionStore,
    now: Timestamp,
    account: Address,
    id: u64,
    weight: Amount,
) {
    store.insert(PositionId(id), account, conforming(weight));
    treasury
        .lock(store, now, account, &[PositionId(id)])
        .unwrap();
}

/// Mint sink that records every call.
#[derive(Default)]
pub struct RecordingMinter {
    pub minted: Vec<(Timestamp, Address, Amount)>,
}

impl RecordingMinter {
    pub fn total(&self) -> Amount {
        self.minted.iter().map(|(_, _, amount)| amount).sum()
    }
}

impl RewardMinter for RecordingMinter {
    fn mint(
        &mut self,
        _tokens: &mut dyn TokenStore,
        now: Timestamp,
        to: Address,
        amount: Amount,
    ) -> Result<(), WeirError> {
        if amount == 0 {
            return Ok(());
        }
        self.minted.push((now, to, amount));
        Ok(())
    }
}
