use serde::{Deserialize, Serialize};

use storeflow_core::AggregateId;

use crate::supplier::SupplierId;

/// Product identifier (store-scoped via `store_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Product directory record.
///
/// `reorder_point` and `reorder_qty` drive the reorder advisor;
/// `cost_price_paise` is the store owner's cost estimate, used on draft
/// purchase orders until the supplier quotes. Inactive products are skipped by
/// the advisor and excluded from generated purchase orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub reorder_point: i64,
    pub reorder_qty: i64,
    /// Cost estimate in paise (smallest currency unit).
    pub cost_price_paise: i64,
    /// Preferred supplier; products without one cannot feed one-click reorders.
    pub supplier_id: Option<SupplierId>,
    pub active: bool,
}
