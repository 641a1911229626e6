//! The append-only stock ledger (event-sourced).
//!
//! One ledger stream per (store, product). Every stock movement in the
//! platform is one signed entry in that stream; the current stock of a product
//! is nothing but the running sum of its entries. Entries are never updated or
//! deleted - corrections are new entries.

pub mod stock;

pub use stock::{
    AppendEntry, LedgerRef, StockEntryAppended, StockLedger, StockLedgerCommand, StockLedgerEvent,
    StockLedgerId,
};
