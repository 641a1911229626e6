use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use storeflow_catalog::ProductId;
use storeflow_core::StoreId;
use storeflow_events::EventEnvelope;
use storeflow_ledger::{StockLedgerEvent, StockLedgerId};

use crate::projections::{Cursors, ProjectionError};
use crate::read_model::StoreIndex;

/// Queryable stock cache: current on-hand per product.
///
/// The ledger stream stays authoritative; this model is the cheap lookup the
/// reorder advisor and availability checks read from. Drift against the
/// ledger is detectable and repairable, never silently corrected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevelReadModel {
    pub product_id: ProductId,
    pub on_hand: i64,
    pub last_movement_at: Option<DateTime<Utc>>,
}

/// Stock level projection over ledger entry events.
#[derive(Debug)]
pub struct StockLevelsProjection<S>
where
    S: StoreIndex<ProductId, StockLevelReadModel>,
{
    index: S,
    cursors: Cursors,
}

impl<S> StockLevelsProjection<S>
where
    S: StoreIndex<ProductId, StockLevelReadModel>,
{
    pub fn new(index: S) -> Self {
        Self {
            index,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, store_id: StoreId, product_id: &ProductId) -> Option<StockLevelReadModel> {
        self.index.get(store_id, product_id)
    }

    pub fn list(&self, store_id: StoreId) -> Vec<StockLevelReadModel> {
        self.index.list(store_id)
    }

    /// Apply a committed envelope into the projection.
    ///
    /// Envelopes for other aggregate types are ignored; replays at or below
    /// the cursor are skipped.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "ledger.stock" {
            return Ok(());
        }

        let store_id = envelope.store_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.admit(store_id, aggregate_id, seq)? {
            return Ok(());
        }

        let ev: StockLedgerEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
        let StockLedgerEvent::EntryAppended(e) = ev;

        if e.store_id != store_id {
            return Err(ProjectionError::StoreIsolation(
                "event store_id does not match envelope store_id".to_string(),
            ));
        }
        if StockLedgerId::for_product(e.product_id).0 != aggregate_id {
            return Err(ProjectionError::StoreIsolation(
                "event product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        let mut rm = self
            .index
            .get(store_id, &e.product_id)
            .unwrap_or(StockLevelReadModel {
                product_id: e.product_id,
                on_hand: 0,
                last_movement_at: None,
            });
        rm.on_hand += e.delta;
        rm.last_movement_at = Some(e.occurred_at);
        self.index.upsert(store_id, e.product_id, rm);

        self.cursors.advance(store_id, aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from a full replay, clearing affected stores
    /// first.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        {
            let mut stores = envs.iter().map(|e| e.store_id()).collect::<Vec<_>>();
            stores.sort_by_key(|s| *s.as_uuid().as_bytes());
            stores.dedup();
            for s in stores {
                self.index.clear_store(s);
                self.cursors.clear_store(s);
            }
        }

        // Deterministic replay order: store, aggregate, sequence.
        envs.sort_by_key(|e| {
            (
                *e.store_id().as_uuid().as_bytes(),
                *e.aggregate_id().as_uuid().as_bytes(),
                e.sequence_number(),
            )
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
