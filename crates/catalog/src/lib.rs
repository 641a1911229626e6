//! Product and supplier directory records.
//!
//! These records are consumed context: the surrounding platform owns their
//! lifecycle (creation, editing, import), the workflow engine reads them for
//! reorder advice, quotation routing and cost snapshots. Current stock is
//! never stored on a record; it is derived from the product's ledger stream.

pub mod product;
pub mod supplier;

pub use product::{Product, ProductId};
pub use supplier::{Supplier, SupplierId};
