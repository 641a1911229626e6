use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storeflow_core::{AggregateId, StoreId};

/// A committed event with its stream coordinates.
///
/// Envelopes are what the event store hands out and what the bus carries:
/// the payload plus everything needed to place it (which store, which
/// aggregate stream, which position). For a stock ledger stream the
/// envelope order *is* the ledger row order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    /// Isolation key; streams never cross stores.
    store_id: StoreId,
    aggregate_id: AggregateId,
    aggregate_type: String,
    /// 1-based position in the aggregate stream, gap-free.
    sequence_number: u64,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        store_id: StoreId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            store_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    /// Stream family, e.g. `ledger.stock`. Stable for the life of a stream.
    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    /// Consumes the envelope, keeping only the payload.
    pub fn into_payload(self) -> E {
        self.payload
    }
}
