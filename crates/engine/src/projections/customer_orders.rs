use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use storeflow_core::{AggregateId, StoreId};
use storeflow_events::{Event, EventEnvelope};
use storeflow_orders::{
    CustomerId, CustomerOrderEvent, CustomerOrderId, CustomerOrderStatus, PaymentMethod,
};

use crate::projections::{Cursors, ProjectionError};
use crate::read_model::StoreIndex;

/// Customer order listing cache, including the confirmation queue fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerOrderReadModel {
    pub order_id: CustomerOrderId,
    pub customer_id: CustomerId,
    pub code: String,
    pub status: CustomerOrderStatus,
    pub payment_method: PaymentMethod,
    pub total_paise: i64,
    pub registered_at: DateTime<Utc>,
}

/// Customer order projection over registration and confirmation events.
#[derive(Debug)]
pub struct CustomerOrdersProjection<S>
where
    S: StoreIndex<CustomerOrderId, CustomerOrderReadModel>,
{
    index: S,
    cursors: Cursors,
}

impl<S> CustomerOrdersProjection<S>
where
    S: StoreIndex<CustomerOrderId, CustomerOrderReadModel>,
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
        order_id: &CustomerOrderId,
    ) -> Option<CustomerOrderReadModel> {
        self.index.get(store_id, order_id)
    }

    pub fn list(&self, store_id: StoreId) -> Vec<CustomerOrderReadModel> {
        self.index.list(store_id)
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "orders.order" {
            return Ok(());
        }

        let store_id = envelope.store_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.admit(store_id, aggregate_id, seq)? {
            return Ok(());
        }

        let ev: CustomerOrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_store, order_id) = match &ev {
            CustomerOrderEvent::Registered(e) => (e.store_id, e.order_id),
            CustomerOrderEvent::Confirmed(e) => (e.store_id, e.order_id),
            CustomerOrderEvent::Rejected(e) => (e.store_id, e.order_id),
            CustomerOrderEvent::Cancelled(e) => (e.store_id, e.order_id),
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

        let mut rm = self
            .index
            .get(store_id, &order_id)
            .unwrap_or(CustomerOrderReadModel {
                order_id,
                customer_id: CustomerId::new(AggregateId::new()),
                code: String::new(),
                status: CustomerOrderStatus::Pending,
                payment_method: PaymentMethod::Prepaid,
                total_paise: 0,
                registered_at: ev.occurred_at(),
            });

        match ev {
            CustomerOrderEvent::Registered(e) => {
                rm.customer_id = e.customer_id;
                rm.code = e.code;
                rm.status = e.initial_status;
                rm.payment_method = e.payment_method;
                rm.total_paise = e.total_paise;
                rm.registered_at = e.occurred_at;
            }
            CustomerOrderEvent::Confirmed(_) => rm.status = CustomerOrderStatus::Confirmed,
            CustomerOrderEvent::Rejected(_) => rm.status = CustomerOrderStatus::Rejected,
            CustomerOrderEvent::Cancelled(_) => rm.status = CustomerOrderStatus::Cancelled,
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
