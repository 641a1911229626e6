use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storeflow_catalog::{ProductId, SupplierId};
use storeflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Entity, StoreId};
use storeflow_events::Event;

use crate::quotation::{ItemQuote, QuoteSheet, merge_quotes, quoted_subtotal};

/// Purchase order identifier (store-scoped via `store_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub AggregateId);

impl PurchaseOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Purchase order item identifier (stable across quotation rounds).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderItemId(Uuid);

impl PurchaseOrderItemId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl core::fmt::Display for PurchaseOrderItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Purchase order status lifecycle.
///
/// Every command guard goes through [`PurchaseOrderStatus::can_transition`];
/// there is no other place transitions are decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Sent,
    QuotationRequested,
    QuotationSubmitted,
    QuotationRevisionRequested,
    QuotationApproved,
    QuotationRejected,
    Shipped,
    Received,
    Rejected,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::Sent => "sent",
            PurchaseOrderStatus::QuotationRequested => "quotation_requested",
            PurchaseOrderStatus::QuotationSubmitted => "quotation_submitted",
            PurchaseOrderStatus::QuotationRevisionRequested => "quotation_revision_requested",
            PurchaseOrderStatus::QuotationApproved => "quotation_approved",
            PurchaseOrderStatus::QuotationRejected => "quotation_rejected",
            PurchaseOrderStatus::Shipped => "shipped",
            PurchaseOrderStatus::Received => "received",
            PurchaseOrderStatus::Rejected => "rejected",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Received
                | PurchaseOrderStatus::Rejected
                | PurchaseOrderStatus::Cancelled
                | PurchaseOrderStatus::QuotationRejected
        )
    }

    /// The store owner may cancel from any non-terminal state.
    pub fn can_cancel(self) -> bool {
        !self.is_terminal()
    }

    /// The supplier may reject any order that has not shipped yet.
    pub fn can_reject(self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Draft
                | PurchaseOrderStatus::Sent
                | PurchaseOrderStatus::QuotationRequested
                | PurchaseOrderStatus::QuotationSubmitted
                | PurchaseOrderStatus::QuotationRevisionRequested
                | PurchaseOrderStatus::QuotationApproved
        )
    }

    /// The one transition table of the purchase order machine.
    pub fn can_transition(self, to: Self) -> bool {
        use PurchaseOrderStatus::*;
        matches!(
            (self, to),
            (Draft, Sent)
                | (Sent, QuotationRequested)
                | (QuotationRequested, QuotationSubmitted)
                | (QuotationRevisionRequested, QuotationSubmitted)
                | (QuotationSubmitted, QuotationApproved)
                | (QuotationSubmitted, QuotationRevisionRequested)
                | (QuotationSubmitted, QuotationRejected)
                | (QuotationApproved, Shipped)
                | (Shipped, Received)
        ) || (to == Cancelled && self.can_cancel())
            || (to == Rejected && self.can_reject())
    }
}

impl core::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One product position on a purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub item_id: PurchaseOrderItemId,
    pub product_id: ProductId,
    pub qty: i64,
    /// Store owner's cost estimate, paise.
    pub cost_paise: i64,
    /// Supplier's quoted cost, paise; settles during negotiation rounds.
    pub quoted_cost_paise: Option<i64>,
}

impl PurchaseOrderItem {
    /// Cost a receipt books for this item: the quoted cost once negotiated,
    /// the store estimate otherwise.
    pub fn effective_cost_paise(&self) -> i64 {
        self.quoted_cost_paise.unwrap_or(self.cost_paise)
    }
}

impl Entity for PurchaseOrderItem {
    type Id = PurchaseOrderItemId;

    fn id(&self) -> &Self::Id {
        &self.item_id
    }
}

/// Item input for purchase order creation.
///
/// Ids are assigned by the caller so the resulting event stays replayable;
/// quoted costs cannot exist before a quotation round, hence no field for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseOrderItem {
    pub item_id: PurchaseOrderItemId,
    pub product_id: ProductId,
    pub qty: i64,
    pub cost_paise: i64,
}

/// Stock movement derived from one received item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub product_id: ProductId,
    pub qty: i64,
    pub unit_cost_paise: i64,
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    store_id: Option<StoreId>,
    supplier_id: Option<SupplierId>,
    code: String,
    status: PurchaseOrderStatus,
    items: Vec<PurchaseOrderItem>,
    notes: Option<String>,
    /// Notes from the latest quotation or revision request.
    quotation_notes: Option<String>,
    subtotal_paise: i64,
    total_paise: i64,
    created_at: Option<DateTime<Utc>>,
    placed_at: Option<DateTime<Utc>>,
    quotation_requested_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            store_id: None,
            supplier_id: None,
            code: String::new(),
            status: PurchaseOrderStatus::Draft,
            items: Vec::new(),
            notes: None,
            quotation_notes: None,
            subtotal_paise: 0,
            total_paise: 0,
            created_at: None,
            placed_at: None,
            quotation_requested_at: None,
            shipped_at: None,
            received_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn store_id(&self) -> Option<StoreId> {
        self.store_id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn items(&self) -> &[PurchaseOrderItem] {
        &self.items
    }

    pub fn item(&self, item_id: PurchaseOrderItemId) -> Option<&PurchaseOrderItem> {
        self.items.iter().find(|it| it.item_id == item_id)
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn quotation_notes(&self) -> Option<&str> {
        self.quotation_notes.as_deref()
    }

    /// Σ qty × cost over the items; quoted costs once a quotation settled.
    pub fn subtotal_paise(&self) -> i64 {
        self.subtotal_paise
    }

    /// Mirrors the subtotal; taxes and fees live outside this workspace.
    pub fn total_paise(&self) -> i64 {
        self.total_paise
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn quotation_requested_at(&self) -> Option<DateTime<Utc>> {
        self.quotation_requested_at
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchaseOrder (items land together with the order, in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub code: String,
    pub supplier_id: SupplierId,
    pub notes: Option<String>,
    pub items: Vec<NewPurchaseOrderItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PlacePurchaseOrder (Draft → Sent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacePurchaseOrder {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RequestQuotation (Sent → QuotationRequested).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestQuotation {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitQuotation (supplier side; all items must end up costed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitQuotation {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub sheet: QuoteSheet,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RequestRevision (notes are mandatory; the supplier needs to know
/// what to change).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRevision {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveQuotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveQuotation {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectQuotation (terminal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectQuotation {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkShipped (supplier side).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkShipped {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkReceived (store side; the emitted event carries the stock
/// movements the engine books to the ledger in the same commit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReceived {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectPurchaseOrder (supplier side, pre-shipment only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectPurchaseOrder {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelPurchaseOrder (store side, any non-terminal state).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelPurchaseOrder {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreatePurchaseOrder(CreatePurchaseOrder),
    PlacePurchaseOrder(PlacePurchaseOrder),
    RequestQuotation(RequestQuotation),
    SubmitQuotation(SubmitQuotation),
    RequestRevision(RequestRevision),
    ApproveQuotation(ApproveQuotation),
    RejectQuotation(RejectQuotation),
    MarkShipped(MarkShipped),
    MarkReceived(MarkReceived),
    RejectPurchaseOrder(RejectPurchaseOrder),
    CancelPurchaseOrder(CancelPurchaseOrder),
}

/// Event: PurchaseOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCreated {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub code: String,
    pub supplier_id: SupplierId,
    pub notes: Option<String>,
    pub items: Vec<PurchaseOrderItem>,
    pub subtotal_paise: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderPlaced {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuotationRequested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationRequested {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuotationSubmitted.
///
/// Carries the complete merged quote set (one entry per item), so replaying
/// the event does not depend on reconstructing earlier rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationSubmitted {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub quotes: Vec<ItemQuote>,
    pub subtotal_paise: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuotationRevisionRequested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationRevisionRequested {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuotationApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationApproved {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuotationRejected (terminal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationRejected {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderShipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderShipped {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderReceived.
///
/// `receipt_lines` is the bridge to the stock ledger: one positive movement
/// per item, costed at the quoted cost when the order went through
/// negotiation, at the store estimate otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderReceived {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub receipt_lines: Vec<ReceiptLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderRejected (terminal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderRejected {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderCancelled (terminal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCancelled {
    pub store_id: StoreId,
    pub order_id: PurchaseOrderId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    Created(PurchaseOrderCreated),
    Placed(PurchaseOrderPlaced),
    QuotationRequested(QuotationRequested),
    QuotationSubmitted(QuotationSubmitted),
    QuotationRevisionRequested(QuotationRevisionRequested),
    QuotationApproved(QuotationApproved),
    QuotationRejected(QuotationRejected),
    Shipped(PurchaseOrderShipped),
    Received(PurchaseOrderReceived),
    Rejected(PurchaseOrderRejected),
    Cancelled(PurchaseOrderCancelled),
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::Created(_) => "purchasing.po.created",
            PurchaseOrderEvent::Placed(_) => "purchasing.po.placed",
            PurchaseOrderEvent::QuotationRequested(_) => "purchasing.po.quotation_requested",
            PurchaseOrderEvent::QuotationSubmitted(_) => "purchasing.po.quotation_submitted",
            PurchaseOrderEvent::QuotationRevisionRequested(_) => {
                "purchasing.po.quotation_revision_requested"
            }
            PurchaseOrderEvent::QuotationApproved(_) => "purchasing.po.quotation_approved",
            PurchaseOrderEvent::QuotationRejected(_) => "purchasing.po.quotation_rejected",
            PurchaseOrderEvent::Shipped(_) => "purchasing.po.shipped",
            PurchaseOrderEvent::Received(_) => "purchasing.po.received",
            PurchaseOrderEvent::Rejected(_) => "purchasing.po.rejected",
            PurchaseOrderEvent::Cancelled(_) => "purchasing.po.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::Created(e) => e.occurred_at,
            PurchaseOrderEvent::Placed(e) => e.occurred_at,
            PurchaseOrderEvent::QuotationRequested(e) => e.occurred_at,
            PurchaseOrderEvent::QuotationSubmitted(e) => e.occurred_at,
            PurchaseOrderEvent::QuotationRevisionRequested(e) => e.occurred_at,
            PurchaseOrderEvent::QuotationApproved(e) => e.occurred_at,
            PurchaseOrderEvent::QuotationRejected(e) => e.occurred_at,
            PurchaseOrderEvent::Shipped(e) => e.occurred_at,
            PurchaseOrderEvent::Received(e) => e.occurred_at,
            PurchaseOrderEvent::Rejected(e) => e.occurred_at,
            PurchaseOrderEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::Created(e) => {
                self.id = e.order_id;
                self.store_id = Some(e.store_id);
                self.supplier_id = Some(e.supplier_id);
                self.code = e.code.clone();
                self.status = PurchaseOrderStatus::Draft;
                self.items = e.items.clone();
                self.notes = e.notes.clone();
                self.subtotal_paise = e.subtotal_paise;
                self.total_paise = e.subtotal_paise;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            PurchaseOrderEvent::Placed(e) => {
                self.status = PurchaseOrderStatus::Sent;
                self.placed_at = Some(e.occurred_at);
            }
            PurchaseOrderEvent::QuotationRequested(e) => {
                self.status = PurchaseOrderStatus::QuotationRequested;
                self.quotation_notes = e.notes.clone();
                self.quotation_requested_at = Some(e.occurred_at);
            }
            PurchaseOrderEvent::QuotationSubmitted(e) => {
                for quote in &e.quotes {
                    if let Some(item) =
                        self.items.iter_mut().find(|it| it.item_id == quote.item_id)
                    {
                        item.quoted_cost_paise = Some(quote.cost_paise);
                    }
                }
                self.subtotal_paise = e.subtotal_paise;
                self.total_paise = e.subtotal_paise;
                self.status = PurchaseOrderStatus::QuotationSubmitted;
            }
            PurchaseOrderEvent::QuotationRevisionRequested(e) => {
                self.status = PurchaseOrderStatus::QuotationRevisionRequested;
                self.quotation_notes = Some(e.notes.clone());
            }
            PurchaseOrderEvent::QuotationApproved(_) => {
                self.status = PurchaseOrderStatus::QuotationApproved;
            }
            PurchaseOrderEvent::QuotationRejected(_) => {
                self.status = PurchaseOrderStatus::QuotationRejected;
            }
            PurchaseOrderEvent::Shipped(e) => {
                self.status = PurchaseOrderStatus::Shipped;
                self.shipped_at = Some(e.occurred_at);
            }
            PurchaseOrderEvent::Received(e) => {
                self.status = PurchaseOrderStatus::Received;
                self.received_at = Some(e.occurred_at);
            }
            PurchaseOrderEvent::Rejected(_) => {
                self.status = PurchaseOrderStatus::Rejected;
            }
            PurchaseOrderEvent::Cancelled(_) => {
                self.status = PurchaseOrderStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::CreatePurchaseOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::PlacePurchaseOrder(cmd) => self.handle_place(cmd),
            PurchaseOrderCommand::RequestQuotation(cmd) => self.handle_request_quotation(cmd),
            PurchaseOrderCommand::SubmitQuotation(cmd) => self.handle_submit_quotation(cmd),
            PurchaseOrderCommand::RequestRevision(cmd) => self.handle_request_revision(cmd),
            PurchaseOrderCommand::ApproveQuotation(cmd) => self.handle_approve_quotation(cmd),
            PurchaseOrderCommand::RejectQuotation(cmd) => self.handle_reject_quotation(cmd),
            PurchaseOrderCommand::MarkShipped(cmd) => self.handle_mark_shipped(cmd),
            PurchaseOrderCommand::MarkReceived(cmd) => self.handle_mark_received(cmd),
            PurchaseOrderCommand::RejectPurchaseOrder(cmd) => self.handle_reject(cmd),
            PurchaseOrderCommand::CancelPurchaseOrder(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl PurchaseOrder {
    fn ensure_store(&self, store_id: StoreId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.store_id != Some(store_id) {
            return Err(DomainError::validation("store mismatch"));
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::validation("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_supplier(&self, supplier_id: SupplierId) -> Result<(), DomainError> {
        if self.supplier_id != Some(supplier_id) {
            return Err(DomainError::Unauthorized);
        }
        Ok(())
    }

    fn ensure_transition(&self, to: PurchaseOrderStatus) -> Result<(), DomainError> {
        if self.status.can_transition(to) {
            Ok(())
        } else {
            Err(DomainError::invalid_transition(format!(
                "purchase order {} -> {}",
                self.status, to
            )))
        }
    }

    fn estimate_subtotal(items: &[NewPurchaseOrderItem]) -> Result<i64, DomainError> {
        let mut total: i128 = 0;
        for item in items {
            total += item.qty as i128 * item.cost_paise as i128;
        }
        i64::try_from(total).map_err(|_| DomainError::validation("subtotal overflows"))
    }

    fn handle_create(
        &self,
        cmd: &CreatePurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        if cmd.code.trim().is_empty() {
            return Err(DomainError::validation("purchase order code is required"));
        }
        for (idx, item) in cmd.items.iter().enumerate() {
            if item.qty <= 0 {
                return Err(DomainError::validation(format!(
                    "item {idx}: qty must be positive"
                )));
            }
            if item.cost_paise < 0 {
                return Err(DomainError::validation(format!(
                    "item {idx}: cost cannot be negative"
                )));
            }
            if cmd.items[..idx].iter().any(|it| it.item_id == item.item_id) {
                return Err(DomainError::validation(format!(
                    "item {idx}: duplicate item id"
                )));
            }
        }

        let subtotal_paise = Self::estimate_subtotal(&cmd.items)?;
        let items = cmd
            .items
            .iter()
            .map(|it| PurchaseOrderItem {
                item_id: it.item_id,
                product_id: it.product_id,
                qty: it.qty,
                cost_paise: it.cost_paise,
                quoted_cost_paise: None,
            })
            .collect();

        Ok(vec![PurchaseOrderEvent::Created(PurchaseOrderCreated {
            store_id: cmd.store_id,
            order_id: cmd.order_id,
            code: cmd.code.trim().to_string(),
            supplier_id: cmd.supplier_id,
            notes: cmd.notes.clone(),
            items,
            subtotal_paise,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_place(
        &self,
        cmd: &PlacePurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_store(cmd.store_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(PurchaseOrderStatus::Sent)?;

        if self.items.is_empty() {
            return Err(DomainError::validation(
                "cannot place purchase order without items",
            ));
        }

        Ok(vec![PurchaseOrderEvent::Placed(PurchaseOrderPlaced {
            store_id: cmd.store_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_request_quotation(
        &self,
        cmd: &RequestQuotation,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_store(cmd.store_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(PurchaseOrderStatus::QuotationRequested)?;

        Ok(vec![PurchaseOrderEvent::QuotationRequested(
            QuotationRequested {
                store_id: cmd.store_id,
                order_id: cmd.order_id,
                notes: cmd.notes.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_submit_quotation(
        &self,
        cmd: &SubmitQuotation,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_store(cmd.store_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_supplier(cmd.supplier_id)?;
        self.ensure_transition(PurchaseOrderStatus::QuotationSubmitted)?;

        let quotes = merge_quotes(&self.items, &cmd.sheet)?;
        let subtotal_paise = quoted_subtotal(&self.items, &quotes)?;

        Ok(vec![PurchaseOrderEvent::QuotationSubmitted(
            QuotationSubmitted {
                store_id: cmd.store_id,
                order_id: cmd.order_id,
                supplier_id: cmd.supplier_id,
                quotes,
                subtotal_paise,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_request_revision(
        &self,
        cmd: &RequestRevision,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_store(cmd.store_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(PurchaseOrderStatus::QuotationRevisionRequested)?;

        if cmd.notes.trim().is_empty() {
            return Err(DomainError::validation(
                "revision request requires notes for the supplier",
            ));
        }

        Ok(vec![PurchaseOrderEvent::QuotationRevisionRequested(
            QuotationRevisionRequested {
                store_id: cmd.store_id,
                order_id: cmd.order_id,
                notes: cmd.notes.trim().to_string(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_approve_quotation(
        &self,
        cmd: &ApproveQuotation,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_store(cmd.store_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(PurchaseOrderStatus::QuotationApproved)?;

        Ok(vec![PurchaseOrderEvent::QuotationApproved(
            QuotationApproved {
                store_id: cmd.store_id,
                order_id: cmd.order_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_reject_quotation(
        &self,
        cmd: &RejectQuotation,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_store(cmd.store_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(PurchaseOrderStatus::QuotationRejected)?;

        Ok(vec![PurchaseOrderEvent::QuotationRejected(
            QuotationRejected {
                store_id: cmd.store_id,
                order_id: cmd.order_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_mark_shipped(
        &self,
        cmd: &MarkShipped,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_store(cmd.store_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_supplier(cmd.supplier_id)?;
        self.ensure_transition(PurchaseOrderStatus::Shipped)?;

        Ok(vec![PurchaseOrderEvent::Shipped(PurchaseOrderShipped {
            store_id: cmd.store_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_received(
        &self,
        cmd: &MarkReceived,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_store(cmd.store_id)?;
        self.ensure_order_id(cmd.order_id)?;

        // A duplicate receipt is not an illegal edge, it is the same receipt
        // again; callers treat it as a no-op failure with no ledger effect.
        if self.status == PurchaseOrderStatus::Received {
            return Err(DomainError::already_processed(format!(
                "purchase order {} already received",
                cmd.order_id
            )));
        }
        self.ensure_transition(PurchaseOrderStatus::Received)?;

        let receipt_lines = self
            .items
            .iter()
            .map(|it| ReceiptLine {
                product_id: it.product_id,
                qty: it.qty,
                unit_cost_paise: it.effective_cost_paise(),
            })
            .collect();

        Ok(vec![PurchaseOrderEvent::Received(PurchaseOrderReceived {
            store_id: cmd.store_id,
            order_id: cmd.order_id,
            receipt_lines,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(
        &self,
        cmd: &RejectPurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_store(cmd.store_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_supplier(cmd.supplier_id)?;
        self.ensure_transition(PurchaseOrderStatus::Rejected)?;

        Ok(vec![PurchaseOrderEvent::Rejected(PurchaseOrderRejected {
            store_id: cmd.store_id,
            order_id: cmd.order_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(
        &self,
        cmd: &CancelPurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_store(cmd.store_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(PurchaseOrderStatus::Cancelled)?;

        Ok(vec![PurchaseOrderEvent::Cancelled(PurchaseOrderCancelled {
            store_id: cmd.store_id,
            order_id: cmd.order_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storeflow_events::execute;

    fn test_store_id() -> StoreId {
        StoreId::new()
    }

    fn test_order_id() -> PurchaseOrderId {
        PurchaseOrderId::new(AggregateId::new())
    }

    fn test_supplier_id() -> SupplierId {
        SupplierId::new(AggregateId::new())
    }

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn new_item(qty: i64, cost_paise: i64) -> NewPurchaseOrderItem {
        NewPurchaseOrderItem {
            item_id: PurchaseOrderItemId::new(),
            product_id: test_product_id(),
            qty,
            cost_paise,
        }
    }

    /// Purchase order in Draft with the given items, plus its context ids.
    fn created_po(
        items: Vec<NewPurchaseOrderItem>,
    ) -> (PurchaseOrder, StoreId, PurchaseOrderId, SupplierId) {
        let store_id = test_store_id();
        let order_id = test_order_id();
        let supplier_id = test_supplier_id();
        let mut po = PurchaseOrder::empty(order_id);

        execute(
            &mut po,
            &PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
                store_id,
                order_id,
                code: "PO-1001".to_string(),
                supplier_id,
                notes: None,
                items,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        (po, store_id, order_id, supplier_id)
    }

    fn place(store_id: StoreId, order_id: PurchaseOrderId) -> PurchaseOrderCommand {
        PurchaseOrderCommand::PlacePurchaseOrder(PlacePurchaseOrder {
            store_id,
            order_id,
            occurred_at: test_time(),
        })
    }

    fn request_quotation(store_id: StoreId, order_id: PurchaseOrderId) -> PurchaseOrderCommand {
        PurchaseOrderCommand::RequestQuotation(RequestQuotation {
            store_id,
            order_id,
            notes: Some("need better rates".to_string()),
            occurred_at: test_time(),
        })
    }

    fn submit(
        store_id: StoreId,
        order_id: PurchaseOrderId,
        supplier_id: SupplierId,
        sheet: QuoteSheet,
    ) -> PurchaseOrderCommand {
        PurchaseOrderCommand::SubmitQuotation(SubmitQuotation {
            store_id,
            order_id,
            supplier_id,
            sheet,
            occurred_at: test_time(),
        })
    }

    fn approve(store_id: StoreId, order_id: PurchaseOrderId) -> PurchaseOrderCommand {
        PurchaseOrderCommand::ApproveQuotation(ApproveQuotation {
            store_id,
            order_id,
            occurred_at: test_time(),
        })
    }

    fn ship(
        store_id: StoreId,
        order_id: PurchaseOrderId,
        supplier_id: SupplierId,
    ) -> PurchaseOrderCommand {
        PurchaseOrderCommand::MarkShipped(MarkShipped {
            store_id,
            order_id,
            supplier_id,
            occurred_at: test_time(),
        })
    }

    fn receive(store_id: StoreId, order_id: PurchaseOrderId) -> PurchaseOrderCommand {
        PurchaseOrderCommand::MarkReceived(MarkReceived {
            store_id,
            order_id,
            occurred_at: test_time(),
        })
    }

    fn full_sheet(po: &PurchaseOrder, cost: i64) -> QuoteSheet {
        QuoteSheet::from_pairs(po.items().iter().map(|it| (it.item_id, cost)))
    }

    #[test]
    fn create_with_items_computes_estimate_subtotal() {
        let (po, _, _, supplier_id) = created_po(vec![new_item(2, 100), new_item(3, 50)]);

        assert_eq!(po.status(), PurchaseOrderStatus::Draft);
        assert_eq!(po.supplier_id(), Some(supplier_id));
        assert_eq!(po.items().len(), 2);
        assert_eq!(po.subtotal_paise(), 2 * 100 + 3 * 50);
        assert_eq!(po.total_paise(), po.subtotal_paise());
        assert!(po.items().iter().all(|it| it.quoted_cost_paise.is_none()));
    }

    #[test]
    fn create_rejects_bad_items() {
        let order_id = test_order_id();
        let po = PurchaseOrder::empty(order_id);
        let mut base = CreatePurchaseOrder {
            store_id: test_store_id(),
            order_id,
            code: "PO-1".to_string(),
            supplier_id: test_supplier_id(),
            notes: None,
            items: vec![new_item(0, 100)],
            occurred_at: test_time(),
        };

        let err = po
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(base.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        base.items = vec![new_item(1, -5)];
        let err = po
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(base.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let dup = new_item(1, 10);
        base.items = vec![dup.clone(), dup];
        let err = po
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(base.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        base.items = vec![new_item(1, 10)];
        base.code = "  ".to_string();
        let err = po
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(base))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn place_requires_at_least_one_item() {
        let (po, store_id, order_id, _) = created_po(vec![]);

        let err = po.handle(&place(store_id, order_id)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn negotiated_lifecycle_reaches_received_with_quoted_costs() {
        let (mut po, store_id, order_id, supplier_id) =
            created_po(vec![new_item(2, 100), new_item(5, 300)]);

        execute(&mut po, &place(store_id, order_id)).unwrap();
        execute(&mut po, &request_quotation(store_id, order_id)).unwrap();
        assert_eq!(po.status(), PurchaseOrderStatus::QuotationRequested);
        assert_eq!(po.quotation_notes(), Some("need better rates"));

        let sheet = QuoteSheet::from_pairs([
            (po.items()[0].item_id, 90),
            (po.items()[1].item_id, 280),
        ]);
        execute(&mut po, &submit(store_id, order_id, supplier_id, sheet)).unwrap();
        assert_eq!(po.status(), PurchaseOrderStatus::QuotationSubmitted);
        assert_eq!(po.subtotal_paise(), 2 * 90 + 5 * 280);

        execute(&mut po, &approve(store_id, order_id)).unwrap();
        execute(&mut po, &ship(store_id, order_id, supplier_id)).unwrap();
        let events = execute(&mut po, &receive(store_id, order_id)).unwrap();

        assert_eq!(po.status(), PurchaseOrderStatus::Received);
        assert!(po.received_at().is_some());
        match &events[0] {
            PurchaseOrderEvent::Received(e) => {
                assert_eq!(e.receipt_lines.len(), 2);
                assert_eq!(e.receipt_lines[0].qty, 2);
                assert_eq!(e.receipt_lines[0].unit_cost_paise, 90);
                assert_eq!(e.receipt_lines[1].unit_cost_paise, 280);
            }
            other => panic!("expected Received event, got {other:?}"),
        }
    }

    #[test]
    fn receipt_without_negotiation_books_estimates() {
        let (mut po, store_id, order_id, supplier_id) = created_po(vec![new_item(4, 150)]);

        // Straight Sent → ... path is not allowed; shipping requires an
        // approved quotation, so run the shortest legal negotiation.
        execute(&mut po, &place(store_id, order_id)).unwrap();
        execute(&mut po, &request_quotation(store_id, order_id)).unwrap();
        let sheet = full_sheet(&po, 150);
        execute(&mut po, &submit(store_id, order_id, supplier_id, sheet)).unwrap();
        execute(&mut po, &approve(store_id, order_id)).unwrap();
        execute(&mut po, &ship(store_id, order_id, supplier_id)).unwrap();
        let events = execute(&mut po, &receive(store_id, order_id)).unwrap();

        match &events[0] {
            PurchaseOrderEvent::Received(e) => {
                assert_eq!(e.receipt_lines[0].unit_cost_paise, 150);
            }
            other => panic!("expected Received event, got {other:?}"),
        }
    }

    #[test]
    fn skipping_states_is_rejected_without_mutation() {
        let (po, store_id, order_id, supplier_id) = created_po(vec![new_item(1, 10)]);
        let before = po.clone();

        let err = po
            .handle(&ship(store_id, order_id, supplier_id))
            .unwrap_err();

        assert!(matches!(err, DomainError::InvalidTransition(_)));
        assert_eq!(po, before);
    }

    #[test]
    fn incomplete_sheet_fails_whole_submission() {
        let (mut po, store_id, order_id, supplier_id) =
            created_po(vec![new_item(1, 10), new_item(1, 20), new_item(1, 30)]);
        execute(&mut po, &place(store_id, order_id)).unwrap();
        execute(&mut po, &request_quotation(store_id, order_id)).unwrap();

        let sheet = QuoteSheet::from_pairs([
            (po.items()[0].item_id, 9),
            (po.items()[2].item_id, 29),
        ]);
        let before = po.clone();
        let err = po
            .handle(&submit(store_id, order_id, supplier_id, sheet))
            .unwrap_err();

        assert!(matches!(err, DomainError::IncompleteQuotation(_)));
        assert_eq!(po, before);
        assert!(po.items().iter().all(|it| it.quoted_cost_paise.is_none()));
    }

    #[test]
    fn revision_round_retains_previous_quotes() {
        let (mut po, store_id, order_id, supplier_id) =
            created_po(vec![new_item(1, 100), new_item(1, 200)]);
        execute(&mut po, &place(store_id, order_id)).unwrap();
        execute(&mut po, &request_quotation(store_id, order_id)).unwrap();
        let cmd = submit(store_id, order_id, supplier_id, full_sheet(&po, 95));
        execute(&mut po, &cmd).unwrap();

        execute(
            &mut po,
            &PurchaseOrderCommand::RequestRevision(RequestRevision {
                store_id,
                order_id,
                notes: "second item is too expensive".to_string(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(
            po.status(),
            PurchaseOrderStatus::QuotationRevisionRequested
        );
        // Quotes from round one survive the revision request.
        assert!(po.items().iter().all(|it| it.quoted_cost_paise == Some(95)));

        // Round two only prices the second item; the first keeps its quote.
        let second = po.items()[1].item_id;
        let sheet = QuoteSheet::from_pairs([(second, 80)]);
        execute(&mut po, &submit(store_id, order_id, supplier_id, sheet)).unwrap();

        assert_eq!(po.items()[0].quoted_cost_paise, Some(95));
        assert_eq!(po.items()[1].quoted_cost_paise, Some(80));
        assert_eq!(po.subtotal_paise(), 95 + 80);
    }

    #[test]
    fn revision_requires_notes() {
        let (mut po, store_id, order_id, supplier_id) = created_po(vec![new_item(1, 10)]);
        execute(&mut po, &place(store_id, order_id)).unwrap();
        execute(&mut po, &request_quotation(store_id, order_id)).unwrap();
        let cmd = submit(store_id, order_id, supplier_id, full_sheet(&po, 9));
        execute(&mut po, &cmd).unwrap();

        let err = po
            .handle(&PurchaseOrderCommand::RequestRevision(RequestRevision {
                store_id,
                order_id,
                notes: "   ".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn approve_is_only_valid_from_submitted() {
        let (mut po, store_id, order_id, _) = created_po(vec![new_item(1, 10)]);
        execute(&mut po, &place(store_id, order_id)).unwrap();
        execute(&mut po, &request_quotation(store_id, order_id)).unwrap();

        let err = po.handle(&approve(store_id, order_id)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn rejected_quotation_is_terminal() {
        let (mut po, store_id, order_id, supplier_id) = created_po(vec![new_item(1, 10)]);
        execute(&mut po, &place(store_id, order_id)).unwrap();
        execute(&mut po, &request_quotation(store_id, order_id)).unwrap();
        let cmd = submit(store_id, order_id, supplier_id, full_sheet(&po, 9));
        execute(&mut po, &cmd).unwrap();
        execute(
            &mut po,
            &PurchaseOrderCommand::RejectQuotation(RejectQuotation {
                store_id,
                order_id,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert_eq!(po.status(), PurchaseOrderStatus::QuotationRejected);
        for cmd in [
            request_quotation(store_id, order_id),
            approve(store_id, order_id),
            PurchaseOrderCommand::CancelPurchaseOrder(CancelPurchaseOrder {
                store_id,
                order_id,
                reason: None,
                occurred_at: test_time(),
            }),
        ] {
            let err = po.handle(&cmd).unwrap_err();
            assert!(matches!(err, DomainError::InvalidTransition(_)));
        }
    }

    #[test]
    fn second_receive_is_already_processed() {
        let (mut po, store_id, order_id, supplier_id) = created_po(vec![new_item(1, 10)]);
        execute(&mut po, &place(store_id, order_id)).unwrap();
        execute(&mut po, &request_quotation(store_id, order_id)).unwrap();
        let cmd = submit(store_id, order_id, supplier_id, full_sheet(&po, 9));
        execute(&mut po, &cmd).unwrap();
        execute(&mut po, &approve(store_id, order_id)).unwrap();
        execute(&mut po, &ship(store_id, order_id, supplier_id)).unwrap();
        execute(&mut po, &receive(store_id, order_id)).unwrap();

        let err = po.handle(&receive(store_id, order_id)).unwrap_err();
        assert!(matches!(err, DomainError::AlreadyProcessed(_)));
    }

    #[test]
    fn wrong_supplier_cannot_submit_or_ship() {
        let (mut po, store_id, order_id, _supplier_id) = created_po(vec![new_item(1, 10)]);
        execute(&mut po, &place(store_id, order_id)).unwrap();
        execute(&mut po, &request_quotation(store_id, order_id)).unwrap();

        let intruder = test_supplier_id();
        let err = po
            .handle(&submit(store_id, order_id, intruder, full_sheet(&po, 9)))
            .unwrap_err();
        assert_eq!(err, DomainError::Unauthorized);

        let err = po.handle(&ship(store_id, order_id, intruder)).unwrap_err();
        assert_eq!(err, DomainError::Unauthorized);
    }

    #[test]
    fn supplier_can_reject_before_shipment() {
        let (mut po, store_id, order_id, supplier_id) = created_po(vec![new_item(1, 10)]);

        // Rejecting straight out of Draft is allowed.
        let events = po
            .handle(&PurchaseOrderCommand::RejectPurchaseOrder(
                RejectPurchaseOrder {
                    store_id,
                    order_id,
                    supplier_id,
                    reason: Some("cannot fulfil".to_string()),
                    occurred_at: test_time(),
                },
            ))
            .unwrap();
        for e in &events {
            po.apply(e);
        }
        assert_eq!(po.status(), PurchaseOrderStatus::Rejected);
    }

    #[test]
    fn supplier_cannot_reject_after_shipment() {
        let (mut po, store_id, order_id, supplier_id) = created_po(vec![new_item(1, 10)]);
        execute(&mut po, &place(store_id, order_id)).unwrap();
        execute(&mut po, &request_quotation(store_id, order_id)).unwrap();
        let cmd = submit(store_id, order_id, supplier_id, full_sheet(&po, 9));
        execute(&mut po, &cmd).unwrap();
        execute(&mut po, &approve(store_id, order_id)).unwrap();
        execute(&mut po, &ship(store_id, order_id, supplier_id)).unwrap();

        let err = po
            .handle(&PurchaseOrderCommand::RejectPurchaseOrder(
                RejectPurchaseOrder {
                    store_id,
                    order_id,
                    supplier_id,
                    reason: None,
                    occurred_at: test_time(),
                },
            ))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn cancel_works_from_any_non_terminal_state() {
        let (mut po, store_id, order_id, _) = created_po(vec![new_item(1, 10)]);
        execute(&mut po, &place(store_id, order_id)).unwrap();
        execute(&mut po, &request_quotation(store_id, order_id)).unwrap();

        execute(
            &mut po,
            &PurchaseOrderCommand::CancelPurchaseOrder(CancelPurchaseOrder {
                store_id,
                order_id,
                reason: Some("supplier unreachable".to_string()),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(po.status(), PurchaseOrderStatus::Cancelled);

        // A second cancel is an illegal edge out of a terminal state.
        let err = po
            .handle(&PurchaseOrderCommand::CancelPurchaseOrder(
                CancelPurchaseOrder {
                    store_id,
                    order_id,
                    reason: None,
                    occurred_at: test_time(),
                },
            ))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn store_mismatch_is_rejected() {
        let (po, _, order_id, _) = created_po(vec![new_item(1, 10)]);

        let err = po.handle(&place(test_store_id(), order_id)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let (po, store_id, order_id, _) = created_po(vec![new_item(1, 10)]);
        let before = po.clone();

        po.handle(&place(store_id, order_id)).unwrap();

        assert_eq!(po, before);
    }

    #[test]
    fn apply_is_deterministic() {
        let (po, store_id, order_id, supplier_id) = created_po(vec![new_item(2, 100)]);
        let mut source = po.clone();
        let mut events = Vec::new();
        events.extend(execute(&mut source, &place(store_id, order_id)).unwrap());
        events.extend(execute(&mut source, &request_quotation(store_id, order_id)).unwrap());
        let cmd = submit(store_id, order_id, supplier_id, full_sheet(&source, 90));
        events.extend(execute(&mut source, &cmd).unwrap());

        let mut a = po.clone();
        let mut b = po.clone();
        for e in &events {
            a.apply(e);
            b.apply(e);
        }

        assert_eq!(a, b);
        assert_eq!(a.version(), po.version() + events.len() as u64);
    }
}
