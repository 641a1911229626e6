//! In-memory bus used by tests and single-process wiring.

use std::sync::{Mutex, mpsc};

use crate::bus::{EventBus, Subscription};

/// Failure publishing to the in-memory bus.
#[derive(Debug)]
pub enum InMemoryBusError {
    /// The subscriber list lock was poisoned by a panicking thread.
    Poisoned,
}

/// Broadcast bus backed by std `mpsc` channels.
///
/// Every subscriber owns a channel; publishing clones the message into
/// each live channel, pruning channels whose receiver has been dropped.
/// Delivery is fan-out and per-publisher ordered.
#[derive(Debug)]
pub struct InMemoryEventBus<E> {
    senders: Mutex<Vec<mpsc::Sender<E>>>,
}

impl<E> InMemoryEventBus<E> {
    pub fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }
}

impl<E> Default for InMemoryEventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventBus<E> for InMemoryEventBus<E>
where
    E: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: E) -> Result<(), Self::Error> {
        let mut senders = self
            .senders
            .lock()
            .map_err(|_| InMemoryBusError::Poisoned)?;
        senders.retain(|tx| tx.send(message.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Subscription<E> {
        let (tx, rx) = mpsc::channel();

        // A poisoned lock still hands back a subscription; it will simply
        // never receive anything.
        if let Ok(mut senders) = self.senders.lock() {
            senders.push(tx);
        }

        Subscription::new(rx)
    }
}
