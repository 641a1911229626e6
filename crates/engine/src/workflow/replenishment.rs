//! Reorder advisor wiring: stock levels from the ledger cache, lead times
//! from the supplier directory, accepted groups into draft purchase orders.

use serde_json::Value as JsonValue;

use storeflow_catalog::SupplierId;
use storeflow_core::{Actor, ActorRole, DomainError, StoreId};
use storeflow_events::{EventBus, EventEnvelope};
use storeflow_purchasing::{NewPurchaseOrderItem, PurchaseOrderId, PurchaseOrderItemId};
use storeflow_replenishment::{ReorderPlan, suggest_reorders};

use crate::dispatcher::WorkflowError;
use crate::event_store::{EventStore, StoredEvent};
use crate::read_model::StoreIndex;

use super::WorkflowEngine;

impl<S, B> WorkflowEngine<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Run the reorder advisor over the store's product directory.
    ///
    /// Levels come from the stock cache; a product with no cache row counts
    /// as zero on hand.
    pub fn reorder_plan(
        &self,
        actor: &Actor,
        store_id: StoreId,
    ) -> Result<ReorderPlan, WorkflowError> {
        actor.require_role(ActorRole::StoreOwner)?;

        let products = self.products(store_id);
        Ok(suggest_reorders(
            &products,
            |product_id| {
                self.stock_levels
                    .get(store_id, &product_id)
                    .map(|rm| rm.on_hand)
                    .unwrap_or(0)
            },
            |supplier_id| {
                self.suppliers
                    .get(store_id, &supplier_id)
                    .map(|s| s.lead_time_days)
            },
        ))
    }

    /// Turn one supplier group of the current plan into a draft purchase
    /// order.
    ///
    /// Proposed quantities become order items costed at the directory cost
    /// price; from there the order walks the normal purchasing lifecycle.
    /// Fails with [`DomainError::NotFound`] when the supplier has no group
    /// in the current plan.
    pub fn generate_reorder_po(
        &self,
        actor: &Actor,
        store_id: StoreId,
        supplier_id: SupplierId,
        order_id: PurchaseOrderId,
        code: impl Into<String>,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        actor.require_role(ActorRole::StoreOwner)?;

        let plan = self.reorder_plan(actor, store_id)?;
        let group = plan.group_for(supplier_id).ok_or(DomainError::not_found())?;

        let mut items = Vec::with_capacity(group.suggestions.len());
        for suggestion in &group.suggestions {
            let product = self
                .product(store_id, &suggestion.product_id)
                .ok_or(DomainError::not_found())?;
            items.push(NewPurchaseOrderItem {
                item_id: PurchaseOrderItemId::new(),
                product_id: suggestion.product_id,
                qty: suggestion.proposed_qty,
                cost_paise: product.cost_price_paise,
            });
        }

        self.create_purchase_order(actor, store_id, order_id, code, supplier_id, None, items)
    }
}
