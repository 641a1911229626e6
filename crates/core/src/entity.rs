//! Entity trait.
//!
//! An entity keeps its identity while its attributes change: a purchase
//! order item stays the same item across quotation rounds even as its
//! quoted cost moves. Contrast with [`crate::value_object::ValueObject`],
//! which has no identity at all.

/// Something with a stable, typed identity.
///
/// Implementors are "the same thing" when their ids match, regardless of
/// field values. The id type must behave like a key: cheap to clone,
/// hashable, printable in assertions.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
