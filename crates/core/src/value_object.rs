//! Value object trait: equality by value, not identity.
//!
//! Value objects are domain objects that have **no identity** - they are defined
//! entirely by their attribute values. Two value objects with the same values are
//! considered equal.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. They represent
/// concepts where identity doesn't matter - only the values matter.
///
/// ## Value Object vs Entity
///
/// - **Value Object**: No identity (two value objects with same values are equal)
/// - **Entity**: Has identity (two entities with same ID are the same entity)
///
/// Example:
/// - An order line `{ product_id, qty: 3, price_snap_paise: 2500 }` is a value
///   object - the order holds it by position, not by an id of its own.
/// - A purchase order item carries its own `item_id` (quotes attach to it across
///   revision rounds), so it is an entity.
///
/// To "modify" a value object, create a new one with the new values. This keeps
/// values safe to share and lets them behave like primitives (copied, compared).
///
/// The trait requires `Clone` (values are copied, not referenced), `PartialEq`
/// (compared by attribute values) and `Debug` (logging, testing).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
