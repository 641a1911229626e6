//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus is the **distribution** side of the engine: committed events are
//! appended to the event store first, then published here for consumers that
//! live outside the commit path (notification dispatch, reporting feeds,
//! dashboards).
//!
//! ## Design Philosophy
//!
//! The bus is intentionally **lightweight** and makes minimal assumptions:
//!
//! - **Transport-agnostic**: Works with in-memory channels, message queues, etc.
//! - **At-least-once delivery**: Events may be delivered multiple times; consumers must be idempotent
//! - **No ordering guarantees across publishers**: within one publisher, messages arrive in publish order
//! - **No persistence**: Bus is for distribution, not storage (event store is source of truth)
//!
//! ## Why At-Least-Once?
//!
//! Events are persisted before publication, so a lost or duplicated delivery
//! never loses a fact: consumers can always reprocess from the store. That
//! makes at-least-once acceptable, and keeps the contract small. Consumers
//! must be idempotent - processing the same event twice should produce the
//! same result (or be a no-op).

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to an event stream.
///
/// Each subscription gets a copy of all events published to the bus
/// (broadcast semantics).
///
/// ## Usage Pattern
///
/// ```ignore
/// let subscription = bus.subscribe();
///
/// loop {
///     match subscription.recv_timeout(Duration::from_secs(1)) {
///         Ok(event) => process(event)?,
///         Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,  // Check for shutdown
///         Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,  // Bus closed
///     }
/// }
/// ```
///
/// Subscriptions are designed for single-threaded consumption: each
/// subscription belongs to one consumer thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// The bus sits between the event store and event consumers:
///
/// ```text
/// Command → Event Store (append) → Bus (publish) → Consumers
///                                                     ├─ external notification dispatch
///                                                     ├─ reporting feeds
///                                                     └─ test subscribers
/// ```
///
/// Events are **stored first**, then **published**. If publication fails the
/// facts are still in the store and can be republished; `publish()` errors are
/// surfaced to the caller, which may retry.
///
/// The trait requires `Send + Sync`: multiple threads publish concurrently.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
