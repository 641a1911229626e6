use serde::{Deserialize, Serialize};

use storeflow_catalog::{Product, ProductId, SupplierId};

/// One product the store should reorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderSuggestion {
    pub product_id: ProductId,
    pub sku: String,
    pub current_stock: i64,
    pub reorder_point: i64,
    /// Quantity that tops stock up to reorder_point + reorder_qty.
    pub proposed_qty: i64,
    /// Remaining stock expressed in units of the usual reorder batch.
    pub days_of_cover: f64,
}

/// Suggestions for one supplier, ready to become a single purchase order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierReorderGroup {
    pub supplier_id: SupplierId,
    /// None when the supplier is missing from the directory.
    pub lead_time_days: Option<u32>,
    pub suggestions: Vec<ReorderSuggestion>,
}

/// Advisor output: supplier groups in first-seen product order, plus the
/// products that triggered but have no preferred supplier. Unsourced
/// products never enter a group; a purchase order needs a supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderPlan {
    pub supplier_groups: Vec<SupplierReorderGroup>,
    pub unsourced: Vec<ReorderSuggestion>,
}

impl ReorderPlan {
    pub fn is_empty(&self) -> bool {
        self.supplier_groups.is_empty() && self.unsourced.is_empty()
    }

    pub fn suggestion_count(&self) -> usize {
        self.supplier_groups
            .iter()
            .map(|g| g.suggestions.len())
            .sum::<usize>()
            + self.unsourced.len()
    }

    pub fn group_for(&self, supplier_id: SupplierId) -> Option<&SupplierReorderGroup> {
        self.supplier_groups
            .iter()
            .find(|g| g.supplier_id == supplier_id)
    }
}

fn build_suggestion(product: &Product, current_stock: i64) -> ReorderSuggestion {
    // Top up past the trigger threshold, never less than one usual batch.
    let proposed_qty = product
        .reorder_qty
        .max(product.reorder_point - current_stock + product.reorder_qty);
    let days_of_cover = current_stock as f64 / product.reorder_qty.max(1) as f64;

    ReorderSuggestion {
        product_id: product.id,
        sku: product.sku.clone(),
        current_stock,
        reorder_point: product.reorder_point,
        proposed_qty,
        days_of_cover,
    }
}

/// Walk the product directory and propose reorders.
///
/// A product triggers when it is active and its current stock is at or
/// below its reorder point. `stock_of` and `lead_time_of` keep the advisor
/// independent of where levels and supplier records actually live.
pub fn suggest_reorders(
    products: &[Product],
    stock_of: impl Fn(ProductId) -> i64,
    lead_time_of: impl Fn(SupplierId) -> Option<u32>,
) -> ReorderPlan {
    let mut supplier_groups: Vec<SupplierReorderGroup> = Vec::new();
    let mut unsourced = Vec::new();

    for product in products {
        if !product.active {
            continue;
        }
        let current_stock = stock_of(product.id);
        if current_stock > product.reorder_point {
            continue;
        }

        let suggestion = build_suggestion(product, current_stock);
        match product.supplier_id {
            Some(supplier_id) => {
                match supplier_groups
                    .iter_mut()
                    .find(|g| g.supplier_id == supplier_id)
                {
                    Some(group) => group.suggestions.push(suggestion),
                    None => supplier_groups.push(SupplierReorderGroup {
                        supplier_id,
                        lead_time_days: lead_time_of(supplier_id),
                        suggestions: vec![suggestion],
                    }),
                }
            }
            None => unsourced.push(suggestion),
        }
    }

    ReorderPlan {
        supplier_groups,
        unsourced,
    }
}
