use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use storeflow_core::{AggregateId, StoreId};

use super::query::EventFilter;
use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    store_id: StoreId,
    aggregate_id: AggregateId,
}

/// In-memory append-only event store.
///
/// A single lock guards all streams, which gives `append_batch` its
/// all-or-nothing semantics and serializes concurrent writers per stream.
/// Intended for tests/dev; not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Check one stream append's internal consistency and return its key.
    fn stream_key(append: &StreamAppend, batch_store: StoreId) -> Result<StreamKey, EventStoreError> {
        // Callers filter out empty appends before reaching here.
        let first = &append.events[0];
        if first.store_id != batch_store {
            return Err(EventStoreError::StoreIsolation(
                "batch spans multiple stores".to_string(),
            ));
        }

        for (idx, e) in append.events.iter().enumerate() {
            if e.store_id != first.store_id {
                return Err(EventStoreError::StoreIsolation(format!(
                    "stream append contains multiple store_ids (index {idx})"
                )));
            }
            if e.aggregate_id != first.aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "stream append contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != first.aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream append contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        Ok(StreamKey {
            store_id: first.store_id,
            aggregate_id: first.aggregate_id,
        })
    }
}

impl EventStore for InMemoryEventStore {
    fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        // A stream with nothing to say must not fail the whole batch.
        let batch: Vec<StreamAppend> = batch
            .into_iter()
            .filter(|a| !a.events.is_empty())
            .collect();
        let Some(batch_store) = batch.first().map(|a| a.events[0].store_id) else {
            return Ok(vec![]);
        };

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        // Validate every stream before writing anything; the batch commits
        // all-or-nothing.
        let mut keys = Vec::with_capacity(batch.len());
        let mut seen = HashSet::with_capacity(batch.len());
        for append in &batch {
            let key = Self::stream_key(append, batch_store)?;
            if !seen.insert(key) {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch targets stream {} more than once",
                    key.aggregate_id
                )));
            }

            let stream = streams.get(&key).map(Vec::as_slice).unwrap_or(&[]);
            let current = Self::current_version(stream);
            if !append.expected_version.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "stream {}: expected {:?}, found {current}",
                    key.aggregate_id, append.expected_version
                )));
            }

            // Aggregate type stays stable across the stream's lifetime.
            if let Some(existing) = stream.first() {
                let attempted = &append.events[0].aggregate_type;
                if existing.aggregate_type != *attempted {
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "stream aggregate_type is '{}', attempted append with '{attempted}'",
                        existing.aggregate_type
                    )));
                }
            }

            keys.push(key);
        }

        // Assign sequence numbers and append.
        let mut committed = Vec::new();
        for (append, key) in batch.into_iter().zip(keys) {
            let stream = streams.entry(key).or_default();
            let mut next = Self::current_version(stream) + 1;
            for e in append.events {
                let stored = StoredEvent {
                    event_id: e.event_id,
                    store_id: e.store_id,
                    aggregate_id: e.aggregate_id,
                    aggregate_type: e.aggregate_type,
                    sequence_number: next,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    payload: e.payload,
                };
                next += 1;
                stream.push(stored.clone());
                committed.push(stored);
            }
        }

        Ok(committed)
    }

    fn load_stream(
        &self,
        store_id: StoreId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            store_id,
            aggregate_id,
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams.get(&key).cloned().unwrap_or_default())
    }

    fn query_events(
        &self,
        store_id: StoreId,
        filter: &EventFilter,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let mut events: Vec<StoredEvent> = streams
            .iter()
            .filter(|(k, _)| k.store_id == store_id)
            .flat_map(|(_, stream)| stream.iter())
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();

        // Deterministic fold order: aggregate first, then stream position.
        events.sort_by_key(|e| (*e.aggregate_id.as_uuid().as_bytes(), e.sequence_number));

        Ok(events)
    }
}
