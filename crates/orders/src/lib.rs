//! Customer order lifecycle.
//!
//! Orders arrive from the storefront already paid (prepaid) or payable on
//! delivery. Cash-on-delivery orders and orders flagged by the storefront
//! wait in a confirmation queue; confirming one commits stock, so the engine
//! pairs the `Confirmed` event with stock ledger movements in one commit.

pub mod order;

pub use order::{
    CancelOrder, ConfirmOrder, CustomerId, CustomerOrder, CustomerOrderCommand,
    CustomerOrderEvent, CustomerOrderId, CustomerOrderStatus, OrderLine, PaymentMethod,
    RegisterOrder, RejectOrder, needs_confirmation,
};
