use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use storeflow_core::{AggregateId, ExpectedVersion, StoreId};

use super::query::EventFilter;

/// An event ready to be appended to a stream (no sequence number yet).
///
/// Built from a typed domain event via [`UncommittedEvent::from_typed`], which
/// serializes the payload to JSON and captures the event metadata needed to
/// deserialize it later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub store_id: StoreId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A persisted event with its assigned position in the stream.
///
/// Sequence numbers are stream-scoped (`store_id` + `aggregate_id`), start at
/// 1 and increase without gaps. They double as the optimistic concurrency
/// version of the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub store_id: StoreId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Convert into a store-scoped envelope for publication/projection.
    pub fn to_envelope(&self) -> storeflow_events::EventEnvelope<JsonValue> {
        storeflow_events::EventEnvelope::new(
            self.event_id,
            self.store_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.payload.clone(),
        )
    }
}

/// One stream's contribution to an atomic batch append.
///
/// `expected_version` is checked against the stream's current version before
/// anything in the batch is written.
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub expected_version: ExpectedVersion,
    pub events: Vec<UncommittedEvent>,
}

/// Event store operation error.
///
/// Infrastructure failures only; domain rule violations never reach here
/// because aggregates decide before anything is appended.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("store isolation violation: {0}")]
    StoreIsolation(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),
}

/// Append-only, store-scoped event store.
///
/// Events live in streams, one stream per aggregate instance, keyed by
/// `(store_id, aggregate_id)`. Implementations must:
///
/// - enforce store isolation (a batch never spans stores)
/// - enforce optimistic concurrency per stream before writing anything
/// - assign gap-free sequence numbers starting at `current_version + 1`
/// - commit a batch atomically: every stream's events or none at all
/// - serialize concurrent appends to the same stream
pub trait EventStore: Send + Sync {
    /// Append to several distinct streams of one store as a single atomic
    /// commit. This is the transaction boundary workflows rely on, e.g. a
    /// status change plus the ledger entries it implies.
    fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Append events to a single aggregate stream.
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.append_batch(vec![StreamAppend {
            expected_version,
            events,
        }])
    }

    /// Load the full stream for a store + aggregate, in sequence order.
    /// Empty when the aggregate does not exist yet.
    fn load_stream(
        &self,
        store_id: StoreId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Scan a store's events across streams, filtered.
    ///
    /// Results are ordered by (aggregate, sequence) so a consumer can fold
    /// per-stream state deterministically; used for audit reads and read
    /// model verification, not for command handling.
    fn query_events(
        &self,
        store_id: StoreId,
        filter: &EventFilter,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append_batch(batch)
    }

    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(
        &self,
        store_id: StoreId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(store_id, aggregate_id)
    }

    fn query_events(
        &self,
        store_id: StoreId,
        filter: &EventFilter,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).query_events(store_id, filter)
    }
}

impl UncommittedEvent {
    /// Wrap a typed domain event with stream metadata.
    pub fn from_typed<E>(
        store_id: StoreId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: storeflow_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            store_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
