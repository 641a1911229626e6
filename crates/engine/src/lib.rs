//! Engine layer: event store, projections, workflow orchestration.
//!
//! The engine is the only layer that touches persistence. Domain crates stay
//! pure; this crate loads their streams, runs their decision logic, appends
//! the resulting events (multiple streams in one atomic batch where a
//! workflow demands it) and keeps the disposable read models in sync.

pub mod dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod workflow;


pub use dispatcher::WorkflowError;
pub use event_store::{
    EventFilter, EventStore, EventStoreError, InMemoryEventStore, StoredEvent, StreamAppend,
    UncommittedEvent,
};
pub use read_model::{InMemoryStoreIndex, StoreIndex};
pub use workflow::{InsufficientItem, StockDrift, WorkflowEngine};
