//! Position source interface and in-memory implementation.
//!
//! Collateral positions live in an external position contract; the ledger
//! only reads their metadata and takes custody while they are locked.
//! [`MemoryPositionStore`] backs tests and single-process hosts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, WeirError};
use crate::types::{Address, Amount, AssetId, PositionId};

/// Read-only attributes of a collateral position.
///
/// `weight` is the position's share weight (its liquidity) used for both
/// lock accounting and reward distribution.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionMetadata {
    pub asset0: AssetId,
    pub asset1: AssetId,
    pub fee_tier: u32,
    pub lower_bound: i32,
    pub upper_bound: i32,
    pub weight: Amount,
}

/// External position source: metadata reads and custody transfer.
pub trait PositionStore: Send + Sync {
    /// Metadata for a position. Unknown ids are an error.
    fn metadata(&self, id: PositionId) -> Result<PositionMetadata, WeirError>;

    /// Current custody holder of a position.
    fn holder(&self, id: PositionId) -> Result<Address, WeirError>;

    /// Transfer custody of `id` from `from` to `to`.
    ///
    /// Fails without effect when `from` is not the current holder.
    fn transfer(&mut self, id: PositionId, from: Address, to: Address) -> Result<(), WeirError>;
}

/// In-memory position registry.
#[derive(Debug, Clone, Default)]
pub struct MemoryPositionStore {
    positions: HashMap<PositionId, (Address, PositionMetadata)>,
}

impl MemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a position held by `holder`. Fixture helper.
    pub fn insert(&mut self, id: PositionId, holder: Address, metadata: PositionMetadata) {
        self.positions.insert(id, (holder, metadata));
    }
}

impl PositionStore for MemoryPositionStore {
    fn metadata(&self, id: PositionId) -> Result<PositionMetadata, WeirError> {
        self.positions
            .get(&id)
            .map(|(_, meta)| *meta)
            .ok_or_else(|| StoreError::UnknownPosition(id.to_string()).into())
    }

    fn holder(&self, id: PositionId) -> Result<Address, WeirError> {
        self.positions
            .get(&id)
            .map(|(holder, _)| *holder)
            .ok_or_else(|| StoreError::UnknownPosition(id.to_string()).into())
    }

    fn transfer(&mut self, id: PositionId, from: Address, to: Address) -> Result<(), WeirError> {
        let (holder, _) = self
            .positions
            .get(&id)
            .ok_or_else(|| StoreError::UnknownPosition(id.to_string()))?;
        if *holder != from {
            return Err(StoreError::NotHolder {
                position: id.to_string(),
                expected: from.to_string(),
            }
            .into());
        }
        if let Some(entry) = self.positions.get_mut(&id) {
            entry.0 = to;
        }
        Ok(())
    }
}
