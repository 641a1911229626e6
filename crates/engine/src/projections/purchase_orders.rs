use serde_json::Value as JsonValue;

use storeflow_catalog::SupplierId;
use storeflow_core::{AggregateId, StoreId};
use storeflow_events::EventEnvelope;
use storeflow_purchasing::{PurchaseOrderEvent, PurchaseOrderId, PurchaseOrderStatus};

use crate::projections::{Cursors, ProjectionError};
use crate::read_model::StoreIndex;

/// Purchase order listing cache: one row per order.
///
/// `subtotal_paise` tracks the current best figure: the store's estimate
/// until a quotation lands, the quoted subtotal afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrderReadModel {
    pub order_id: PurchaseOrderId,
    pub code: String,
    pub supplier_id: SupplierId,
    pub status: PurchaseOrderStatus,
    pub subtotal_paise: i64,
}

/// Purchase order projection over the negotiation lifecycle events.
#[derive(Debug)]
pub struct PurchaseOrdersProjection<S>
where
    S: StoreIndex<PurchaseOrderId, PurchaseOrderReadModel>,
{
    index: S,
    cursors: Cursors,
}

impl<S> PurchaseOrdersProjection<S>
where
    S: StoreIndex<PurchaseOrderId, PurchaseOrderReadModel>,
{
    pub fn new(index: S) -> Self {
        Self {
            index,
            cursors: Cursors::new(),
        }
    }

    pub fn get(
        &self,
        store_id: StoreId,
        order_id: &PurchaseOrderId,
    ) -> Option<PurchaseOrderReadModel> {
        self.index.get(store_id, order_id)
    }

    pub fn list(&self, store_id: StoreId) -> Vec<PurchaseOrderReadModel> {
        self.index.list(store_id)
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "purchasing.po" {
            return Ok(());
        }

        let store_id = envelope.store_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.admit(store_id, aggregate_id, seq)? {
            return Ok(());
        }

        let ev: PurchaseOrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_store, order_id) = match &ev {
            PurchaseOrderEvent::Created(e) => (e.store_id, e.order_id),
            PurchaseOrderEvent::Placed(e) => (e.store_id, e.order_id),
            PurchaseOrderEvent::QuotationRequested(e) => (e.store_id, e.order_id),
            PurchaseOrderEvent::QuotationSubmitted(e) => (e.store_id, e.order_id),
            PurchaseOrderEvent::QuotationRevisionRequested(e) => (e.store_id, e.order_id),
            PurchaseOrderEvent::QuotationApproved(e) => (e.store_id, e.order_id),
            PurchaseOrderEvent::QuotationRejected(e) => (e.store_id, e.order_id),
            PurchaseOrderEvent::Shipped(e) => (e.store_id, e.order_id),
            PurchaseOrderEvent::Received(e) => (e.store_id, e.order_id),
            PurchaseOrderEvent::Rejected(e) => (e.store_id, e.order_id),
            PurchaseOrderEvent::Cancelled(e) => (e.store_id, e.order_id),
        };

        if event_store != store_id {
            return Err(ProjectionError::StoreIsolation(
                "event store_id does not match envelope store_id".to_string(),
            ));
        }
        if order_id.0 != aggregate_id {
            return Err(ProjectionError::StoreIsolation(
                "event order_id does not match envelope aggregate_id".to_string(),
            ));
        }

        // Tolerate mid-stream replays: rows the Created event would have
        // seeded get a placeholder until a rebuild fills them in.
        let mut rm = self
            .index
            .get(store_id, &order_id)
            .unwrap_or(PurchaseOrderReadModel {
                order_id,
                code: String::new(),
                supplier_id: SupplierId::new(AggregateId::new()),
                status: PurchaseOrderStatus::Draft,
                subtotal_paise: 0,
            });

        match ev {
            PurchaseOrderEvent::Created(e) => {
                rm.code = e.code;
                rm.supplier_id = e.supplier_id;
                rm.status = PurchaseOrderStatus::Draft;
                rm.subtotal_paise = e.subtotal_paise;
            }
            PurchaseOrderEvent::Placed(_) => rm.status = PurchaseOrderStatus::Sent,
            PurchaseOrderEvent::QuotationRequested(_) => {
                rm.status = PurchaseOrderStatus::QuotationRequested;
            }
            PurchaseOrderEvent::QuotationSubmitted(e) => {
                rm.status = PurchaseOrderStatus::QuotationSubmitted;
                rm.subtotal_paise = e.subtotal_paise;
            }
            PurchaseOrderEvent::QuotationRevisionRequested(_) => {
                rm.status = PurchaseOrderStatus::QuotationRevisionRequested;
            }
            PurchaseOrderEvent::QuotationApproved(_) => {
                rm.status = PurchaseOrderStatus::QuotationApproved;
            }
            PurchaseOrderEvent::QuotationRejected(_) => {
                rm.status = PurchaseOrderStatus::QuotationRejected;
            }
            PurchaseOrderEvent::Shipped(_) => rm.status = PurchaseOrderStatus::Shipped,
            PurchaseOrderEvent::Received(_) => rm.status = PurchaseOrderStatus::Received,
            PurchaseOrderEvent::Rejected(_) => rm.status = PurchaseOrderStatus::Rejected,
            PurchaseOrderEvent::Cancelled(_) => rm.status = PurchaseOrderStatus::Cancelled,
        }

        self.index.upsert(store_id, order_id, rm);
        self.cursors.advance(store_id, aggregate_id, seq);
        Ok(())
    }

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
