//! Shared command execution plumbing for workflows.
//!
//! Every workflow operation follows the same pipeline:
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the aggregate stream (store-scoped)
//!   ↓
//! 2. Rehydrate state (apply history in sequence order)
//!   ↓
//! 3. Handle the command (pure decision, produces events)
//!   ↓
//! 4. Append the batch to the store (optimistic concurrency check)
//!   ↓
//! 5. Project and publish the committed events
//! ```
//!
//! The helpers here cover steps 1-4; [`crate::workflow::WorkflowEngine`]
//! composes them per operation and owns step 5 plus the conflict retry
//! loop. Nothing in this module performs IO of its own.

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use storeflow_core::{Aggregate, AggregateId, DomainError, StoreId};

use crate::event_store::{EventStoreError, StoredEvent, UncommittedEvent};
use crate::projections::ProjectionError;

/// Workflow execution error.
///
/// Domain rule violations keep their [`DomainError`] shape so callers can
/// tell an already-processed receipt from an insufficient-stock refusal;
/// infrastructure failures get their own variants.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Optimistic concurrency failure that survived the retry budget.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Cross-store or cross-aggregate stream mixing.
    #[error("store isolation violation: {0}")]
    StoreIsolation(String),

    /// Historical payloads no longer deserialize into the aggregate's events.
    #[error("event deserialization failed: {0}")]
    Deserialize(String),

    /// Persisting to the event store failed.
    #[error("event store failure: {0}")]
    Store(EventStoreError),

    /// Publication failed after a successful append. The events are
    /// committed; downstream delivery is at-least-once on retry.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for WorkflowError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => WorkflowError::Concurrency(msg),
            EventStoreError::StoreIsolation(msg) => WorkflowError::StoreIsolation(msg),
            other => WorkflowError::Store(other),
        }
    }
}

impl From<ProjectionError> for WorkflowError {
    fn from(value: ProjectionError) -> Self {
        match value {
            ProjectionError::Deserialize(msg) => WorkflowError::Deserialize(msg),
            ProjectionError::StoreIsolation(msg) => WorkflowError::StoreIsolation(msg),
            err @ ProjectionError::NonMonotonicSequence { .. } => {
                WorkflowError::Store(EventStoreError::InvalidAppend(err.to_string()))
            }
        }
    }
}

impl WorkflowError {
    /// True when reloading the stream and re-deciding may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::Concurrency(_))
    }
}

pub(crate) fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

/// Reject streams a buggy backend could hand us: wrong store, wrong
/// aggregate, or broken sequence numbering.
pub(crate) fn validate_loaded_stream(
    store_id: StoreId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), WorkflowError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.store_id != store_id {
            return Err(WorkflowError::StoreIsolation(format!(
                "loaded stream contains wrong store_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(WorkflowError::StoreIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number == 0 {
            return Err(WorkflowError::Store(EventStoreError::InvalidAppend(
                "stored event has sequence_number=0".to_string(),
            )));
        }
        if e.sequence_number <= last {
            return Err(WorkflowError::Store(EventStoreError::InvalidAppend(
                format!(
                    "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                    e.sequence_number
                ),
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

/// Apply a validated stream to a fresh aggregate in sequence order.
pub(crate) fn rehydrate<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), WorkflowError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| WorkflowError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}

/// Wrap decided domain events for persistence, minting fresh event ids.
pub(crate) fn to_uncommitted<E>(
    store_id: StoreId,
    aggregate_id: AggregateId,
    aggregate_type: &str,
    events: &[E],
) -> Result<Vec<UncommittedEvent>, WorkflowError>
where
    E: storeflow_events::Event + Serialize,
{
    events
        .iter()
        .map(|ev| {
            UncommittedEvent::from_typed(store_id, aggregate_id, aggregate_type, Uuid::now_v7(), ev)
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(WorkflowError::from)
}
