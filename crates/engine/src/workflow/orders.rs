//! Customer order operations: registration, the confirmation gate and the
//! terminal paths, with stock committed and returned through the ledger.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use storeflow_core::{Actor, ActorRole, Aggregate, DomainError, ExpectedVersion, StoreId};
use storeflow_events::{EventBus, EventEnvelope};
use storeflow_ledger::LedgerRef;
use storeflow_orders::{
    CancelOrder, ConfirmOrder, CustomerId, CustomerOrder, CustomerOrderCommand, CustomerOrderEvent,
    CustomerOrderId, CustomerOrderStatus, OrderLine, PaymentMethod, RegisterOrder, RejectOrder,
    needs_confirmation,
};

use crate::dispatcher::{WorkflowError, to_uncommitted};
use crate::event_store::{EventStore, StoredEvent, StreamAppend};
use crate::projections::CustomerOrderReadModel;

use super::stock::{InsufficientItem, StockMovement, insufficient_stock_error};
use super::{CUSTOMER_ORDER_AGGREGATE, WorkflowEngine};

/// Ledger movements for a set of order lines, one per product.
///
/// Lines repeating a product merge into a single movement so the ledger
/// carries one entry per product per order action. Confirmations take stock
/// out, every other reference puts it back.
fn order_line_movements(
    lines: &[OrderLine],
    order_id: CustomerOrderId,
    ref_type: LedgerRef,
) -> Vec<StockMovement> {
    let sign: i64 = if ref_type == LedgerRef::OrderConfirm {
        -1
    } else {
        1
    };

    let mut movements: Vec<StockMovement> = Vec::new();
    for l in lines {
        match movements.iter_mut().find(|m| m.product_id == l.product_id) {
            Some(m) => m.delta += sign * l.qty,
            None => movements.push(StockMovement {
                product_id: l.product_id,
                ref_type,
                ref_id: order_id.0,
                delta: sign * l.qty,
                unit_cost_paise: None,
            }),
        }
    }
    movements
}

impl<S, B> WorkflowEngine<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Load, decide and commit one customer order command, retrying on
    /// version conflicts.
    fn run_order_command(
        &self,
        store_id: StoreId,
        order_id: CustomerOrderId,
        make_cmd: impl Fn(DateTime<Utc>) -> CustomerOrderCommand,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        self.with_conflict_retry(|| {
            let (order, version) = self.load_customer_order(store_id, order_id)?;
            let decided = order.handle(&make_cmd(Utc::now()))?;
            if decided.is_empty() {
                return Ok(vec![]);
            }
            self.commit(vec![StreamAppend {
                expected_version: ExpectedVersion::Exact(version),
                events: to_uncommitted(store_id, order_id.0, CUSTOMER_ORDER_AGGREGATE, &decided)?,
            }])
        })
    }

    /// Register an incoming storefront order.
    ///
    /// Lines carry price snapshots; no stock moves yet. Cash-on-delivery
    /// orders and orders registered as awaiting confirmation queue for the
    /// store owner's decision.
    #[allow(clippy::too_many_arguments)]
    pub fn register_order(
        &self,
        actor: &Actor,
        store_id: StoreId,
        order_id: CustomerOrderId,
        customer_id: CustomerId,
        code: impl Into<String>,
        payment_method: PaymentMethod,
        initial_status: CustomerOrderStatus,
        lines: Vec<OrderLine>,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        actor.require_role(ActorRole::Customer)?;

        let code = code.into();
        self.run_order_command(store_id, order_id, |occurred_at| {
            CustomerOrderCommand::RegisterOrder(RegisterOrder {
                store_id,
                order_id,
                customer_id,
                code: code.clone(),
                payment_method,
                initial_status,
                lines: lines.clone(),
                occurred_at,
            })
        })
    }

    /// Confirm an order and commit its stock, atomically.
    ///
    /// Every line is checked against the ledger; if any product falls short
    /// the whole confirmation fails with [`DomainError::InsufficientStock`]
    /// listing every shortfall, and nothing is written. When two confirms
    /// race, one wins and the other decides
    /// [`DomainError::AlreadyProcessed`] against the winner's state.
    pub fn confirm_order(
        &self,
        actor: &Actor,
        store_id: StoreId,
        order_id: CustomerOrderId,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        actor.require_role(ActorRole::StoreOwner)?;

        self.with_conflict_retry(|| {
            let (order, version) = self.load_customer_order(store_id, order_id)?;
            let occurred_at = Utc::now();
            let decided = order.handle(&CustomerOrderCommand::ConfirmOrder(ConfirmOrder {
                store_id,
                order_id,
                occurred_at,
            }))?;

            let movements =
                order_line_movements(order.lines(), order_id, LedgerRef::OrderConfirm);
            let ledger = self.decide_ledger_entries(store_id, &movements, occurred_at)?;
            if !ledger.shortfalls.is_empty() {
                return Err(insufficient_stock_error(&ledger.shortfalls).into());
            }

            let mut batch = vec![StreamAppend {
                expected_version: ExpectedVersion::Exact(version),
                events: to_uncommitted(store_id, order_id.0, CUSTOMER_ORDER_AGGREGATE, &decided)?,
            }];
            batch.extend(ledger.appends);
            self.commit(batch)
        })
    }

    /// Check what a confirmation would take, without taking it.
    ///
    /// Empty result means the order would confirm at the current stock
    /// levels. A result is only a snapshot; the confirmation itself
    /// re-checks inside its own commit.
    pub fn check_stock_availability(
        &self,
        store_id: StoreId,
        order_id: CustomerOrderId,
    ) -> Result<Vec<InsufficientItem>, WorkflowError> {
        let (order, version) = self.load_customer_order(store_id, order_id)?;
        if version == 0 {
            return Err(DomainError::not_found().into());
        }

        let movements = order_line_movements(order.lines(), order_id, LedgerRef::OrderConfirm);
        let ledger = self.decide_ledger_entries(store_id, &movements, Utc::now())?;
        Ok(ledger.shortfalls)
    }

    /// Turn an order down. The reason is mandatory and shown to the customer.
    pub fn reject_order(
        &self,
        actor: &Actor,
        store_id: StoreId,
        order_id: CustomerOrderId,
        reason: String,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        actor.require_role(ActorRole::StoreOwner)?;
        self.run_order_command(store_id, order_id, |occurred_at| {
            CustomerOrderCommand::RejectOrder(RejectOrder {
                store_id,
                order_id,
                reason: reason.clone(),
                occurred_at,
            })
        })
    }

    /// Cancel an order.
    ///
    /// Cancelling a confirmed order returns its committed stock in the same
    /// batch; cancelling an unconfirmed one books nothing.
    pub fn cancel_order(
        &self,
        actor: &Actor,
        store_id: StoreId,
        order_id: CustomerOrderId,
        reason: Option<String>,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        actor.require_any(&[ActorRole::StoreOwner, ActorRole::Customer])?;

        self.with_conflict_retry(|| {
            let (order, version) = self.load_customer_order(store_id, order_id)?;
            let restock_lines = order.restock_lines().to_vec();
            let occurred_at = Utc::now();
            let decided = order.handle(&CustomerOrderCommand::CancelOrder(CancelOrder {
                store_id,
                order_id,
                reason: reason.clone(),
                occurred_at,
            }))?;

            let restock = decided
                .iter()
                .any(|e| matches!(e, CustomerOrderEvent::Cancelled(c) if c.restock));
            let mut batch = vec![StreamAppend {
                expected_version: ExpectedVersion::Exact(version),
                events: to_uncommitted(store_id, order_id.0, CUSTOMER_ORDER_AGGREGATE, &decided)?,
            }];
            if restock {
                let movements =
                    order_line_movements(&restock_lines, order_id, LedgerRef::OrderCancel);
                let ledger = self.decide_ledger_entries(store_id, &movements, occurred_at)?;
                if !ledger.shortfalls.is_empty() {
                    return Err(insufficient_stock_error(&ledger.shortfalls).into());
                }
                batch.extend(ledger.appends);
            }
            self.commit(batch)
        })
    }

    /// Orders waiting for the store owner, oldest first.
    pub fn orders_awaiting_confirmation(&self, store_id: StoreId) -> Vec<CustomerOrderReadModel> {
        let mut rows: Vec<_> = self
            .customer_orders
            .list(store_id)
            .into_iter()
            .filter(|rm| needs_confirmation(rm.status, rm.payment_method))
            .collect();
        rows.sort_by_key(|rm| rm.registered_at);
        rows
    }

    /// Rehydrated customer order, straight from its stream.
    pub fn customer_order(
        &self,
        store_id: StoreId,
        order_id: CustomerOrderId,
    ) -> Result<CustomerOrder, WorkflowError> {
        let (order, version) = self.load_customer_order(store_id, order_id)?;
        if version == 0 {
            return Err(DomainError::not_found().into());
        }
        Ok(order)
    }

    /// Cached customer order rows of a store, oldest first.
    pub fn list_customer_orders(&self, store_id: StoreId) -> Vec<CustomerOrderReadModel> {
        let mut rows = self.customer_orders.list(store_id);
        rows.sort_by_key(|rm| rm.registered_at);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storeflow_catalog::ProductId;
    use storeflow_core::AggregateId;

    fn pid() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn oid() -> CustomerOrderId {
        CustomerOrderId::new(AggregateId::new())
    }

    #[test]
    fn confirm_movements_are_negative_and_merged_per_product() {
        let shared = pid();
        let other = pid();
        let lines = vec![
            OrderLine {
                product_id: shared,
                qty: 2,
                price_snap_paise: 100,
            },
            OrderLine {
                product_id: other,
                qty: 1,
                price_snap_paise: 50,
            },
            OrderLine {
                product_id: shared,
                qty: 3,
                price_snap_paise: 100,
            },
        ];

        let movements = order_line_movements(&lines, oid(), LedgerRef::OrderConfirm);

        assert_eq!(movements.len(), 2);
        let shared_mv = movements
            .iter()
            .find(|m| m.product_id == shared)
            .unwrap();
        assert_eq!(shared_mv.delta, -5);
        assert_eq!(shared_mv.ref_type, LedgerRef::OrderConfirm);
        assert_eq!(
            movements.iter().find(|m| m.product_id == other).unwrap().delta,
            -1
        );
    }

    #[test]
    fn cancel_movements_are_positive() {
        let lines = vec![OrderLine {
            product_id: pid(),
            qty: 4,
            price_snap_paise: 100,
        }];

        let movements = order_line_movements(&lines, oid(), LedgerRef::OrderCancel);

        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].delta, 4);
        assert!(movements[0].unit_cost_paise.is_none());
    }
}
