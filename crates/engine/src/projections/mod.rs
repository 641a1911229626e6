//! Projection implementations (read model builders).
//!
//! Projections consume committed envelopes and maintain query-optimized
//! read models. All projections are:
//! - **Rebuildable**: reconstructed from the event log at any time
//! - **Store-isolated**: records partitioned by store
//! - **Idempotent**: safe under at-least-once delivery

pub mod customer_orders;
pub mod purchase_orders;
pub mod stock_levels;

pub use customer_orders::{CustomerOrderReadModel, CustomerOrdersProjection};
pub use purchase_orders::{PurchaseOrderReadModel, PurchaseOrdersProjection};
pub use stock_levels::{StockLevelReadModel, StockLevelsProjection};

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use storeflow_core::{AggregateId, StoreId};

/// Failure modes shared by every projection.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("store isolation violation: {0}")]
    StoreIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    store_id: StoreId,
    aggregate_id: AggregateId,
}

/// Per (store, aggregate) stream position, supporting at-least-once delivery.
#[derive(Debug, Default)]
pub(crate) struct Cursors {
    inner: RwLock<HashMap<CursorKey, u64>>,
}

impl Cursors {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn last(&self, store_id: StoreId, aggregate_id: AggregateId) -> u64 {
        match self.inner.read() {
            Ok(map) => *map
                .get(&CursorKey {
                    store_id,
                    aggregate_id,
                })
                .unwrap_or(&0),
            Err(_) => 0,
        }
    }

    /// Gate an incoming sequence number against the cursor.
    ///
    /// `Ok(true)` means apply then [`Cursors::advance`]; `Ok(false)` means
    /// the envelope is a replay at or below the cursor and must be skipped.
    /// The first event of a stream may carry any positive sequence; after
    /// that, increments must be strict and gap-free.
    pub(crate) fn admit(
        &self,
        store_id: StoreId,
        aggregate_id: AggregateId,
        seq: u64,
    ) -> Result<bool, ProjectionError> {
        let last = self.last(store_id, aggregate_id);
        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }
        if seq != last + 1 && last != 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }

    pub(crate) fn advance(&self, store_id: StoreId, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(
                CursorKey {
                    store_id,
                    aggregate_id,
                },
                seq,
            );
        }
    }

    pub(crate) fn clear_store(&self, store_id: StoreId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|k, _| k.store_id != store_id);
        }
    }
}
