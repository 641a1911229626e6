use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeflow_catalog::ProductId;
use storeflow_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, StoreId, ValueObject,
};
use storeflow_events::Event;

/// Customer order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerOrderId(pub AggregateId);

impl CustomerOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CustomerOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Customer identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub AggregateId);

impl CustomerId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    Prepaid,
}

/// Customer order status.
///
/// Stock commits exactly once, on the edge into `Confirmed`; leaving
/// `Confirmed` (cancellation) is the only edge that returns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerOrderStatus {
    Pending,
    AwaitingConfirmation,
    Confirmed,
    Rejected,
    Cancelled,
}

impl CustomerOrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CustomerOrderStatus::Pending => "pending",
            CustomerOrderStatus::AwaitingConfirmation => "awaiting_confirmation",
            CustomerOrderStatus::Confirmed => "confirmed",
            CustomerOrderStatus::Rejected => "rejected",
            CustomerOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CustomerOrderStatus::Rejected | CustomerOrderStatus::Cancelled
        )
    }

    /// The one transition table of the customer order machine.
    pub fn can_transition(self, to: Self) -> bool {
        use CustomerOrderStatus::*;
        matches!(
            (self, to),
            (Pending, Confirmed)
                | (AwaitingConfirmation, Confirmed)
                | (Pending, Rejected)
                | (AwaitingConfirmation, Rejected)
                | (Pending, Cancelled)
                | (AwaitingConfirmation, Cancelled)
                | (Confirmed, Cancelled)
        )
    }
}

impl core::fmt::Display for CustomerOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an order sits in the store owner's confirmation queue.
///
/// Cash-on-delivery orders always queue; prepaid ones only when the
/// storefront flagged them for review at registration.
pub fn needs_confirmation(status: CustomerOrderStatus, payment: PaymentMethod) -> bool {
    match status {
        CustomerOrderStatus::AwaitingConfirmation => true,
        CustomerOrderStatus::Pending => payment == PaymentMethod::CashOnDelivery,
        _ => false,
    }
}

/// One product position on a customer order.
///
/// `price_snap_paise` is the selling price at registration time; later
/// catalog price changes do not touch registered orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub qty: i64,
    pub price_snap_paise: i64,
}

impl ValueObject for OrderLine {}

/// Aggregate root: CustomerOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerOrder {
    id: CustomerOrderId,
    store_id: Option<StoreId>,
    customer_id: Option<CustomerId>,
    code: String,
    status: CustomerOrderStatus,
    payment_method: Option<PaymentMethod>,
    lines: Vec<OrderLine>,
    total_paise: i64,
    reject_reason: Option<String>,
    registered_at: Option<DateTime<Utc>>,
    confirmed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl CustomerOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: CustomerOrderId) -> Self {
        Self {
            id,
            store_id: None,
            customer_id: None,
            code: String::new(),
            status: CustomerOrderStatus::Pending,
            payment_method: None,
            lines: Vec::new(),
            total_paise: 0,
            reject_reason: None,
            registered_at: None,
            confirmed_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CustomerOrderId {
        self.id
    }

    pub fn store_id(&self) -> Option<StoreId> {
        self.store_id
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn status(&self) -> CustomerOrderStatus {
        self.status
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total_paise(&self) -> i64 {
        self.total_paise
    }

    pub fn reject_reason(&self) -> Option<&str> {
        self.reject_reason.as_deref()
    }

    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        self.registered_at
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }

    /// Whether this order is waiting for the store owner's decision.
    pub fn awaiting_confirmation(&self) -> bool {
        match self.payment_method {
            Some(payment) => needs_confirmation(self.status, payment),
            None => false,
        }
    }

    /// Lines whose stock is committed and would return on cancellation.
    /// Empty unless the order is currently confirmed.
    pub fn restock_lines(&self) -> &[OrderLine] {
        if self.status == CustomerOrderStatus::Confirmed {
            &self.lines
        } else {
            &[]
        }
    }
}

impl AggregateRoot for CustomerOrder {
    type Id = CustomerOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterOrder.
///
/// The storefront decides the initial status: `Pending` for the normal
/// flow, `AwaitingConfirmation` to force review of a prepaid order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterOrder {
    pub store_id: StoreId,
    pub order_id: CustomerOrderId,
    pub customer_id: CustomerId,
    pub code: String,
    pub payment_method: PaymentMethod,
    pub initial_status: CustomerOrderStatus,
    pub lines: Vec<OrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmOrder (commits stock; the engine pairs the event with
/// ledger movements in one commit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmOrder {
    pub store_id: StoreId,
    pub order_id: CustomerOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectOrder (reason is mandatory; the customer sees it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectOrder {
    pub store_id: StoreId,
    pub order_id: CustomerOrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub store_id: StoreId,
    pub order_id: CustomerOrderId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerOrderCommand {
    RegisterOrder(RegisterOrder),
    ConfirmOrder(ConfirmOrder),
    RejectOrder(RejectOrder),
    CancelOrder(CancelOrder),
}

/// Event: OrderRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRegistered {
    pub store_id: StoreId,
    pub order_id: CustomerOrderId,
    pub customer_id: CustomerId,
    pub code: String,
    pub payment_method: PaymentMethod,
    pub initial_status: CustomerOrderStatus,
    pub lines: Vec<OrderLine>,
    pub total_paise: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmed {
    pub store_id: StoreId,
    pub order_id: CustomerOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderRejected (terminal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRejected {
    pub store_id: StoreId,
    pub order_id: CustomerOrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled (terminal).
///
/// `restock` is true when the cancellation left `Confirmed`, meaning the
/// committed stock has to come back through the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub store_id: StoreId,
    pub order_id: CustomerOrderId,
    pub reason: Option<String>,
    pub restock: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerOrderEvent {
    Registered(OrderRegistered),
    Confirmed(OrderConfirmed),
    Rejected(OrderRejected),
    Cancelled(OrderCancelled),
}

impl Event for CustomerOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustomerOrderEvent::Registered(_) => "orders.order.registered",
            CustomerOrderEvent::Confirmed(_) => "orders.order.confirmed",
            CustomerOrderEvent::Rejected(_) => "orders.order.rejected",
            CustomerOrderEvent::Cancelled(_) => "orders.order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CustomerOrderEvent::Registered(e) => e.occurred_at,
            CustomerOrderEvent::Confirmed(e) => e.occurred_at,
            CustomerOrderEvent::Rejected(e) => e.occurred_at,
            CustomerOrderEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for CustomerOrder {
    type Command = CustomerOrderCommand;
    type Event = CustomerOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CustomerOrderEvent::Registered(e) => {
                self.id = e.order_id;
                self.store_id = Some(e.store_id);
                self.customer_id = Some(e.customer_id);
                self.code = e.code.clone();
                self.status = e.initial_status;
                self.payment_method = Some(e.payment_method);
                self.lines = e.lines.clone();
                self.total_paise = e.total_paise;
                self.registered_at = Some(e.occurred_at);
                self.created = true;
            }
            CustomerOrderEvent::Confirmed(e) => {
                self.status = CustomerOrderStatus::Confirmed;
                self.confirmed_at = Some(e.occurred_at);
            }
            CustomerOrderEvent::Rejected(e) => {
                self.status = CustomerOrderStatus::Rejected;
                self.reject_reason = Some(e.reason.clone());
            }
            CustomerOrderEvent::Cancelled(_) => {
                self.status = CustomerOrderStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CustomerOrderCommand::RegisterOrder(cmd) => self.handle_register(cmd),
            CustomerOrderCommand::ConfirmOrder(cmd) => self.handle_confirm(cmd),
            CustomerOrderCommand::RejectOrder(cmd) => self.handle_reject(cmd),
            CustomerOrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl CustomerOrder {
    fn ensure_store(&self, store_id: StoreId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.store_id != Some(store_id) {
            return Err(DomainError::validation("store mismatch"));
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: CustomerOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::validation("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_transition(&self, to: CustomerOrderStatus) -> Result<(), DomainError> {
        if self.status.can_transition(to) {
            Ok(())
        } else {
            Err(DomainError::invalid_transition(format!(
                "order {} -> {}",
                self.status, to
            )))
        }
    }

    fn handle_register(&self, cmd: &RegisterOrder) -> Result<Vec<CustomerOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        if cmd.code.trim().is_empty() {
            return Err(DomainError::validation("order code is required"));
        }
        if !matches!(
            cmd.initial_status,
            CustomerOrderStatus::Pending | CustomerOrderStatus::AwaitingConfirmation
        ) {
            return Err(DomainError::validation(
                "orders register as pending or awaiting_confirmation",
            ));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("order requires at least one line"));
        }
        for (idx, line) in cmd.lines.iter().enumerate() {
            if line.qty <= 0 {
                return Err(DomainError::validation(format!(
                    "line {idx}: qty must be positive"
                )));
            }
            if line.price_snap_paise < 0 {
                return Err(DomainError::validation(format!(
                    "line {idx}: price cannot be negative"
                )));
            }
        }

        let mut total: i128 = 0;
        for line in &cmd.lines {
            total += line.qty as i128 * line.price_snap_paise as i128;
        }
        let total_paise =
            i64::try_from(total).map_err(|_| DomainError::validation("order total overflows"))?;

        Ok(vec![CustomerOrderEvent::Registered(OrderRegistered {
            store_id: cmd.store_id,
            order_id: cmd.order_id,
            customer_id: cmd.customer_id,
            code: cmd.code.trim().to_string(),
            payment_method: cmd.payment_method,
            initial_status: cmd.initial_status,
            lines: cmd.lines.clone(),
            total_paise,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmOrder) -> Result<Vec<CustomerOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_store(cmd.store_id)?;
        self.ensure_order_id(cmd.order_id)?;

        // Losing a confirmation race is not an illegal edge; the order got
        // exactly what this caller wanted, just from someone else.
        if self.status == CustomerOrderStatus::Confirmed {
            return Err(DomainError::already_processed(format!(
                "order {} already confirmed",
                cmd.order_id
            )));
        }
        self.ensure_transition(CustomerOrderStatus::Confirmed)?;

        Ok(vec![CustomerOrderEvent::Confirmed(OrderConfirmed {
            store_id: cmd.store_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectOrder) -> Result<Vec<CustomerOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_store(cmd.store_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(CustomerOrderStatus::Rejected)?;

        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation(
                "rejection requires a reason for the customer",
            ));
        }

        Ok(vec![CustomerOrderEvent::Rejected(OrderRejected {
            store_id: cmd.store_id,
            order_id: cmd.order_id,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<CustomerOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_store(cmd.store_id)?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_transition(CustomerOrderStatus::Cancelled)?;

        Ok(vec![CustomerOrderEvent::Cancelled(OrderCancelled {
            store_id: cmd.store_id,
            order_id: cmd.order_id,
            reason: cmd.reason.clone(),
            restock: self.status == CustomerOrderStatus::Confirmed,
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

    fn test_order_id() -> CustomerOrderId {
        CustomerOrderId::new(AggregateId::new())
    }

    fn test_customer_id() -> CustomerId {
        CustomerId::new(AggregateId::new())
    }

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn line(qty: i64, price: i64) -> OrderLine {
        OrderLine {
            product_id: test_product_id(),
            qty,
            price_snap_paise: price,
        }
    }

    fn registered_order(
        initial: CustomerOrderStatus,
        payment: PaymentMethod,
        lines: Vec<OrderLine>,
    ) -> (CustomerOrder, StoreId, CustomerOrderId) {
        let store_id = test_store_id();
        let order_id = test_order_id();
        let mut order = CustomerOrder::empty(order_id);

        execute(
            &mut order,
            &CustomerOrderCommand::RegisterOrder(RegisterOrder {
                store_id,
                order_id,
                customer_id: test_customer_id(),
                code: "SO-2001".to_string(),
                payment_method: payment,
                initial_status: initial,
                lines,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        (order, store_id, order_id)
    }

    fn confirm(store_id: StoreId, order_id: CustomerOrderId) -> CustomerOrderCommand {
        CustomerOrderCommand::ConfirmOrder(ConfirmOrder {
            store_id,
            order_id,
            occurred_at: test_time(),
        })
    }

    fn cancel(store_id: StoreId, order_id: CustomerOrderId) -> CustomerOrderCommand {
        CustomerOrderCommand::CancelOrder(CancelOrder {
            store_id,
            order_id,
            reason: None,
            occurred_at: test_time(),
        })
    }

    #[test]
    fn register_snapshots_lines_and_computes_total() {
        let (order, _, _) = registered_order(
            CustomerOrderStatus::Pending,
            PaymentMethod::Prepaid,
            vec![line(2, 500), line(1, 250)],
        );

        assert_eq!(order.status(), CustomerOrderStatus::Pending);
        assert_eq!(order.lines().len(), 2);
        assert_eq!(order.total_paise(), 2 * 500 + 250);
        assert_eq!(order.payment_method(), Some(PaymentMethod::Prepaid));
        assert!(order.registered_at().is_some());
    }

    #[test]
    fn register_rejects_bad_input() {
        let order_id = test_order_id();
        let order = CustomerOrder::empty(order_id);
        let mut base = RegisterOrder {
            store_id: test_store_id(),
            order_id,
            customer_id: test_customer_id(),
            code: "SO-1".to_string(),
            payment_method: PaymentMethod::Prepaid,
            initial_status: CustomerOrderStatus::Pending,
            lines: vec![line(1, 100)],
            occurred_at: test_time(),
        };

        base.lines = vec![];
        let err = order
            .handle(&CustomerOrderCommand::RegisterOrder(base.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        base.lines = vec![line(0, 100)];
        let err = order
            .handle(&CustomerOrderCommand::RegisterOrder(base.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        base.lines = vec![line(1, -1)];
        let err = order
            .handle(&CustomerOrderCommand::RegisterOrder(base.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        base.lines = vec![line(1, 100)];
        base.initial_status = CustomerOrderStatus::Confirmed;
        let err = order
            .handle(&CustomerOrderCommand::RegisterOrder(base))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn confirm_moves_pending_and_awaiting_orders() {
        for initial in [
            CustomerOrderStatus::Pending,
            CustomerOrderStatus::AwaitingConfirmation,
        ] {
            let (mut order, store_id, order_id) =
                registered_order(initial, PaymentMethod::CashOnDelivery, vec![line(1, 100)]);

            execute(&mut order, &confirm(store_id, order_id)).unwrap();

            assert_eq!(order.status(), CustomerOrderStatus::Confirmed);
            assert!(order.confirmed_at().is_some());
        }
    }

    #[test]
    fn second_confirm_is_already_processed() {
        let (mut order, store_id, order_id) = registered_order(
            CustomerOrderStatus::AwaitingConfirmation,
            PaymentMethod::CashOnDelivery,
            vec![line(1, 100)],
        );
        execute(&mut order, &confirm(store_id, order_id)).unwrap();

        let err = order.handle(&confirm(store_id, order_id)).unwrap_err();

        assert!(matches!(err, DomainError::AlreadyProcessed(_)));
        assert_eq!(order.status(), CustomerOrderStatus::Confirmed);
    }

    #[test]
    fn confirm_after_rejection_is_invalid() {
        let (mut order, store_id, order_id) = registered_order(
            CustomerOrderStatus::AwaitingConfirmation,
            PaymentMethod::CashOnDelivery,
            vec![line(1, 100)],
        );
        execute(
            &mut order,
            &CustomerOrderCommand::RejectOrder(RejectOrder {
                store_id,
                order_id,
                reason: "address unreachable".to_string(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let err = order.handle(&confirm(store_id, order_id)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
        assert_eq!(order.reject_reason(), Some("address unreachable"));
    }

    #[test]
    fn reject_requires_a_reason() {
        let (order, store_id, order_id) = registered_order(
            CustomerOrderStatus::AwaitingConfirmation,
            PaymentMethod::CashOnDelivery,
            vec![line(1, 100)],
        );

        let err = order
            .handle(&CustomerOrderCommand::RejectOrder(RejectOrder {
                store_id,
                order_id,
                reason: "  ".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(order.status(), CustomerOrderStatus::AwaitingConfirmation);
    }

    #[test]
    fn reject_after_confirmation_is_invalid() {
        let (mut order, store_id, order_id) = registered_order(
            CustomerOrderStatus::Pending,
            PaymentMethod::CashOnDelivery,
            vec![line(1, 100)],
        );
        execute(&mut order, &confirm(store_id, order_id)).unwrap();

        let err = order
            .handle(&CustomerOrderCommand::RejectOrder(RejectOrder {
                store_id,
                order_id,
                reason: "too late".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn cancel_before_confirmation_does_not_restock() {
        let (mut order, store_id, order_id) = registered_order(
            CustomerOrderStatus::Pending,
            PaymentMethod::Prepaid,
            vec![line(3, 100)],
        );
        assert!(order.restock_lines().is_empty());

        let events = execute(&mut order, &cancel(store_id, order_id)).unwrap();

        match &events[0] {
            CustomerOrderEvent::Cancelled(e) => assert!(!e.restock),
            other => panic!("expected Cancelled event, got {other:?}"),
        }
        assert_eq!(order.status(), CustomerOrderStatus::Cancelled);
    }

    #[test]
    fn cancel_after_confirmation_restocks() {
        let (mut order, store_id, order_id) = registered_order(
            CustomerOrderStatus::Pending,
            PaymentMethod::CashOnDelivery,
            vec![line(3, 100), line(1, 50)],
        );
        execute(&mut order, &confirm(store_id, order_id)).unwrap();
        assert_eq!(order.restock_lines().len(), 2);

        let events = order.handle(&cancel(store_id, order_id)).unwrap();

        match &events[0] {
            CustomerOrderEvent::Cancelled(e) => assert!(e.restock),
            other => panic!("expected Cancelled event, got {other:?}"),
        }
    }

    #[test]
    fn cancel_twice_is_invalid() {
        let (mut order, store_id, order_id) = registered_order(
            CustomerOrderStatus::Pending,
            PaymentMethod::Prepaid,
            vec![line(1, 100)],
        );
        execute(&mut order, &cancel(store_id, order_id)).unwrap();

        let err = order.handle(&cancel(store_id, order_id)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn store_mismatch_is_rejected() {
        let (order, _, order_id) = registered_order(
            CustomerOrderStatus::Pending,
            PaymentMethod::Prepaid,
            vec![line(1, 100)],
        );

        let err = order
            .handle(&confirm(test_store_id(), order_id))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn confirmation_queue_matrix() {
        use CustomerOrderStatus::*;
        use PaymentMethod::*;

        assert!(needs_confirmation(Pending, CashOnDelivery));
        assert!(!needs_confirmation(Pending, Prepaid));
        assert!(needs_confirmation(AwaitingConfirmation, Prepaid));
        assert!(needs_confirmation(AwaitingConfirmation, CashOnDelivery));
        assert!(!needs_confirmation(Confirmed, CashOnDelivery));
        assert!(!needs_confirmation(Rejected, CashOnDelivery));
        assert!(!needs_confirmation(Cancelled, CashOnDelivery));
    }

    #[test]
    fn version_tracks_applied_events() {
        let (mut order, store_id, order_id) = registered_order(
            CustomerOrderStatus::Pending,
            PaymentMethod::CashOnDelivery,
            vec![line(1, 100)],
        );
        assert_eq!(order.version(), 1);

        execute(&mut order, &confirm(store_id, order_id)).unwrap();
        assert_eq!(order.version(), 2);

        execute(&mut order, &cancel(store_id, order_id)).unwrap();
        assert_eq!(order.version(), 3);
    }
}
