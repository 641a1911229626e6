//! Purchase order operations: creation, placement, the quotation rounds,
//! shipment, receipt and the terminal paths.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use storeflow_catalog::SupplierId;
use storeflow_core::{Actor, ActorRole, Aggregate, DomainError, ExpectedVersion, StoreId};
use storeflow_events::{EventBus, EventEnvelope};
use storeflow_ledger::LedgerRef;
use storeflow_purchasing::{
    ApproveQuotation, CancelPurchaseOrder, CreatePurchaseOrder, MarkReceived, MarkShipped,
    NewPurchaseOrderItem, PlacePurchaseOrder, PurchaseOrder, PurchaseOrderCommand,
    PurchaseOrderEvent, PurchaseOrderId, QuoteSheet, RejectPurchaseOrder, RejectQuotation,
    RequestQuotation, RequestRevision, SubmitQuotation,
};

use crate::dispatcher::{WorkflowError, to_uncommitted};
use crate::event_store::{EventStore, StoredEvent, StreamAppend};
use crate::projections::PurchaseOrderReadModel;

use super::stock::{StockMovement, insufficient_stock_error};
use super::{PURCHASE_ORDER_AGGREGATE, WorkflowEngine};

impl<S, B> WorkflowEngine<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Load, decide and commit one purchase order command, retrying on
    /// version conflicts. `make_cmd` runs once per attempt so each retry
    /// decides against the freshly loaded state.
    fn run_po_command(
        &self,
        store_id: StoreId,
        order_id: PurchaseOrderId,
        make_cmd: impl Fn(DateTime<Utc>) -> PurchaseOrderCommand,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        self.with_conflict_retry(|| {
            let (po, version) = self.load_purchase_order(store_id, order_id)?;
            let decided = po.handle(&make_cmd(Utc::now()))?;
            if decided.is_empty() {
                return Ok(vec![]);
            }
            self.commit(vec![StreamAppend {
                expected_version: ExpectedVersion::Exact(version),
                events: to_uncommitted(store_id, order_id.0, PURCHASE_ORDER_AGGREGATE, &decided)?,
            }])
        })
    }

    /// Open a purchase order in Draft, items included.
    ///
    /// The supplier must exist in the store's directory; the order keeps a
    /// snapshot of quantities and cost estimates from here on.
    pub fn create_purchase_order(
        &self,
        actor: &Actor,
        store_id: StoreId,
        order_id: PurchaseOrderId,
        code: impl Into<String>,
        supplier_id: SupplierId,
        notes: Option<String>,
        items: Vec<NewPurchaseOrderItem>,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        actor.require_role(ActorRole::StoreOwner)?;
        if self.supplier(store_id, &supplier_id).is_none() {
            return Err(DomainError::not_found().into());
        }

        let code = code.into();
        self.run_po_command(store_id, order_id, |occurred_at| {
            PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
                store_id,
                order_id,
                code: code.clone(),
                supplier_id,
                notes: notes.clone(),
                items: items.clone(),
                occurred_at,
            })
        })
    }

    /// Send a Draft order to its supplier.
    pub fn place_purchase_order(
        &self,
        actor: &Actor,
        store_id: StoreId,
        order_id: PurchaseOrderId,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        actor.require_role(ActorRole::StoreOwner)?;
        self.run_po_command(store_id, order_id, |occurred_at| {
            PurchaseOrderCommand::PlacePurchaseOrder(PlacePurchaseOrder {
                store_id,
                order_id,
                occurred_at,
            })
        })
    }

    /// Ask the supplier to price the order.
    pub fn request_quotation(
        &self,
        actor: &Actor,
        store_id: StoreId,
        order_id: PurchaseOrderId,
        notes: Option<String>,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        actor.require_role(ActorRole::StoreOwner)?;
        self.run_po_command(store_id, order_id, |occurred_at| {
            PurchaseOrderCommand::RequestQuotation(RequestQuotation {
                store_id,
                order_id,
                notes: notes.clone(),
                occurred_at,
            })
        })
    }

    /// Submit the supplier's quote sheet for the current round.
    ///
    /// Quotes from earlier rounds count toward completeness; the submission
    /// fails whole if any item still has no quote from any round.
    pub fn submit_quotation(
        &self,
        actor: &Actor,
        store_id: StoreId,
        order_id: PurchaseOrderId,
        supplier_id: SupplierId,
        sheet: QuoteSheet,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        actor.require_role(ActorRole::Supplier)?;
        self.run_po_command(store_id, order_id, |occurred_at| {
            PurchaseOrderCommand::SubmitQuotation(SubmitQuotation {
                store_id,
                order_id,
                supplier_id,
                sheet: sheet.clone(),
                occurred_at,
            })
        })
    }

    /// Send the quotation back for another round. Notes are mandatory.
    pub fn request_quotation_revision(
        &self,
        actor: &Actor,
        store_id: StoreId,
        order_id: PurchaseOrderId,
        notes: String,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        actor.require_role(ActorRole::StoreOwner)?;
        self.run_po_command(store_id, order_id, |occurred_at| {
            PurchaseOrderCommand::RequestRevision(RequestRevision {
                store_id,
                order_id,
                notes: notes.clone(),
                occurred_at,
            })
        })
    }

    /// Accept the submitted quotation; the supplier may ship from here.
    pub fn approve_quotation(
        &self,
        actor: &Actor,
        store_id: StoreId,
        order_id: PurchaseOrderId,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        actor.require_role(ActorRole::StoreOwner)?;
        self.run_po_command(store_id, order_id, |occurred_at| {
            PurchaseOrderCommand::ApproveQuotation(ApproveQuotation {
                store_id,
                order_id,
                occurred_at,
            })
        })
    }

    /// Decline the submitted quotation. Terminal for the order.
    pub fn reject_quotation(
        &self,
        actor: &Actor,
        store_id: StoreId,
        order_id: PurchaseOrderId,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        actor.require_role(ActorRole::StoreOwner)?;
        self.run_po_command(store_id, order_id, |occurred_at| {
            PurchaseOrderCommand::RejectQuotation(RejectQuotation {
                store_id,
                order_id,
                occurred_at,
            })
        })
    }

    /// Supplier marks the approved order shipped.
    pub fn mark_shipped(
        &self,
        actor: &Actor,
        store_id: StoreId,
        order_id: PurchaseOrderId,
        supplier_id: SupplierId,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        actor.require_role(ActorRole::Supplier)?;
        self.run_po_command(store_id, order_id, |occurred_at| {
            PurchaseOrderCommand::MarkShipped(MarkShipped {
                store_id,
                order_id,
                supplier_id,
                occurred_at,
            })
        })
    }

    /// Book the shipment's arrival.
    ///
    /// The status change and the positive ledger movements for every item
    /// land in one atomic batch. A second receipt decides
    /// [`DomainError::AlreadyProcessed`] and books nothing, also when the
    /// first receipt won a concurrent race.
    pub fn receive_purchase_order(
        &self,
        actor: &Actor,
        store_id: StoreId,
        order_id: PurchaseOrderId,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        actor.require_role(ActorRole::StoreOwner)?;

        self.with_conflict_retry(|| {
            let (po, version) = self.load_purchase_order(store_id, order_id)?;
            let occurred_at = Utc::now();
            let decided = po.handle(&PurchaseOrderCommand::MarkReceived(MarkReceived {
                store_id,
                order_id,
                occurred_at,
            }))?;

            let mut movements = Vec::new();
            for event in &decided {
                if let PurchaseOrderEvent::Received(e) = event {
                    for line in &e.receipt_lines {
                        movements.push(StockMovement {
                            product_id: line.product_id,
                            ref_type: LedgerRef::PoReceipt,
                            ref_id: order_id.0,
                            delta: line.qty,
                            unit_cost_paise: Some(line.unit_cost_paise),
                        });
                    }
                }
            }

            let ledger = self.decide_ledger_entries(store_id, &movements, occurred_at)?;
            if !ledger.shortfalls.is_empty() {
                return Err(insufficient_stock_error(&ledger.shortfalls).into());
            }

            let mut batch = vec![StreamAppend {
                expected_version: ExpectedVersion::Exact(version),
                events: to_uncommitted(store_id, order_id.0, PURCHASE_ORDER_AGGREGATE, &decided)?,
            }];
            batch.extend(ledger.appends);
            self.commit(batch)
        })
    }

    /// Supplier declines the order. Allowed until shipment, terminal after.
    pub fn reject_purchase_order(
        &self,
        actor: &Actor,
        store_id: StoreId,
        order_id: PurchaseOrderId,
        supplier_id: SupplierId,
        reason: Option<String>,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        actor.require_role(ActorRole::Supplier)?;
        self.run_po_command(store_id, order_id, |occurred_at| {
            PurchaseOrderCommand::RejectPurchaseOrder(RejectPurchaseOrder {
                store_id,
                order_id,
                supplier_id,
                reason: reason.clone(),
                occurred_at,
            })
        })
    }

    /// Store owner withdraws the order from any non-terminal state.
    pub fn cancel_purchase_order(
        &self,
        actor: &Actor,
        store_id: StoreId,
        order_id: PurchaseOrderId,
        reason: Option<String>,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        actor.require_role(ActorRole::StoreOwner)?;
        self.run_po_command(store_id, order_id, |occurred_at| {
            PurchaseOrderCommand::CancelPurchaseOrder(CancelPurchaseOrder {
                store_id,
                order_id,
                reason: reason.clone(),
                occurred_at,
            })
        })
    }

    /// Rehydrated purchase order, straight from its stream.
    pub fn purchase_order(
        &self,
        store_id: StoreId,
        order_id: PurchaseOrderId,
    ) -> Result<PurchaseOrder, WorkflowError> {
        let (po, version) = self.load_purchase_order(store_id, order_id)?;
        if version == 0 {
            return Err(DomainError::not_found().into());
        }
        Ok(po)
    }

    /// Cached purchase order rows of a store, ordered by code.
    pub fn list_purchase_orders(&self, store_id: StoreId) -> Vec<PurchaseOrderReadModel> {
        let mut rows = self.purchase_orders.list(store_id);
        rows.sort_by(|a, b| a.code.cmp(&b.code));
        rows
    }
}
