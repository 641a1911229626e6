//! Event contracts and distribution mechanics.
//!
//! Domain crates define their events against the [`Event`] trait; the engine
//! wraps them in [`EventEnvelope`]s for persistence and publishes them on an
//! [`EventBus`] for external consumers.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
