//! Store-isolated read model storage abstractions.

pub mod store_index;

pub use store_index::{InMemoryStoreIndex, StoreIndex};
