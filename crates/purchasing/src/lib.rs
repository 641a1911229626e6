//! Purchase order workflow (quotation negotiation, event-sourced).
//!
//! A purchase order is one aggregate: the eleven-state lifecycle, the items
//! under negotiation and the quotation rounds all live in a single stream.
//! Receipts hand their stock movements to the engine via the
//! `PurchaseOrderReceived` event; the ledger entries themselves are appended
//! in the same commit.

pub mod order;
pub mod quotation;

pub use order::{
    ApproveQuotation, CancelPurchaseOrder, CreatePurchaseOrder, MarkReceived, MarkShipped,
    NewPurchaseOrderItem, PlacePurchaseOrder, PurchaseOrder, PurchaseOrderCommand,
    PurchaseOrderEvent, PurchaseOrderId, PurchaseOrderItem, PurchaseOrderItemId,
    PurchaseOrderStatus, ReceiptLine, RejectPurchaseOrder, RejectQuotation, RequestQuotation,
    RequestRevision, SubmitQuotation,
};
pub use quotation::{ItemQuote, QuoteSheet, merge_quotes, quoted_subtotal};
