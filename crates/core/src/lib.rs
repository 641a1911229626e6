//! Domain foundation: ids, error taxonomy, aggregate traits, actor roles.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod actor;
pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use actor::{Actor, ActorRole};
pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, StoreId, UserId};
pub use value_object::ValueObject;
