//! Reorder advisor.
//!
//! Pure stock arithmetic over the product directory: no state of its own,
//! no side effects. The engine feeds it current stock levels and supplier
//! lead times and turns accepted suggestions into draft purchase orders.

pub mod advisor;

pub use advisor::{
    ReorderPlan, ReorderSuggestion, SupplierReorderGroup, suggest_reorders,
};
