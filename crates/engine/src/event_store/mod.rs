//! Append-only event store boundary.
//!
//! Store-scoped streams, optimistic concurrency, and atomic multi-stream
//! batches, without storage assumptions. Batches are the transactional
//! backbone of the workflows: a purchase order receipt and its stock ledger
//! entries commit together or not at all.

pub mod in_memory;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use query::EventFilter;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};
