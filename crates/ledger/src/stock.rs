use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeflow_catalog::ProductId;
use storeflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, StoreId};
use storeflow_events::Event;

/// Why a ledger entry exists (the business document it traces back to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerRef {
    /// Goods received against a purchase order (delta > 0).
    PoReceipt,
    /// Stock committed to a confirmed customer order (delta < 0).
    OrderConfirm,
    /// Stock restored by cancelling a confirmed order (delta > 0).
    OrderCancel,
    /// Store-owner correction (either sign).
    ManualAdjustment,
}

impl LedgerRef {
    /// Entries with these ref types must not drive the running stock below zero.
    pub fn requires_non_negative(self) -> bool {
        matches!(self, LedgerRef::OrderConfirm | LedgerRef::ManualAdjustment)
    }
}

/// Stock ledger identifier (aggregate id).
///
/// A product's ledger stream reuses the product's uuid; streams are
/// store-scoped, so this still yields one stream per (store, product).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockLedgerId(pub AggregateId);

impl StockLedgerId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn for_product(product_id: ProductId) -> Self {
        Self(product_id.0)
    }
}

impl core::fmt::Display for StockLedgerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: StockLedger (append-only stock movements for one product).
///
/// Unlike a balance cache, the aggregate's `on_hand` is rebuilt from the
/// stream on every rehydration - it exists so the non-negative guard can
/// decide against the authoritative sum, never against a materialized counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLedger {
    id: StockLedgerId,
    store_id: Option<StoreId>,
    product_id: Option<ProductId>,
    on_hand: i64,
    version: u64,
    created: bool,
}

impl StockLedger {
    /// Empty aggregate for rehydration.
    ///
    /// There is no creation ceremony: the first appended entry pins store and
    /// product identity.
    pub fn empty(id: StockLedgerId) -> Self {
        Self {
            id,
            store_id: None,
            product_id: None,
            on_hand: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> StockLedgerId {
        self.id
    }

    pub fn store_id(&self) -> Option<StoreId> {
        self.store_id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    /// Running sum of all applied entry deltas.
    pub fn on_hand(&self) -> i64 {
        self.on_hand
    }
}

impl AggregateRoot for StockLedger {
    type Id = StockLedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AppendEntry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendEntry {
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub entry_id: uuid::Uuid,
    pub ref_type: LedgerRef,
    /// The purchase order, customer order or adjustment this entry traces to.
    pub ref_id: AggregateId,
    /// Signed quantity; sign must match the ref type.
    pub delta: i64,
    /// Cost per unit in paise, when the movement has one (receipts mostly).
    pub unit_cost_paise: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockLedgerCommand {
    AppendEntry(AppendEntry),
}

/// Event: StockEntryAppended (one per ledger row, immutable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntryAppended {
    pub store_id: StoreId,
    pub product_id: ProductId,
    pub entry_id: uuid::Uuid,
    pub ref_type: LedgerRef,
    pub ref_id: AggregateId,
    pub delta: i64,
    pub unit_cost_paise: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockLedgerEvent {
    EntryAppended(StockEntryAppended),
}

impl Event for StockLedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockLedgerEvent::EntryAppended(_) => "ledger.stock.entry_appended",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockLedgerEvent::EntryAppended(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockLedger {
    type Command = StockLedgerCommand;
    type Event = StockLedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockLedgerEvent::EntryAppended(e) => {
                self.id = StockLedgerId::for_product(e.product_id);
                if !self.created {
                    self.store_id = Some(e.store_id);
                    self.product_id = Some(e.product_id);
                    self.created = true;
                }
                self.on_hand += e.delta;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockLedgerCommand::AppendEntry(cmd) => self.handle_append(cmd),
        }
    }
}

impl StockLedger {
    fn ensure_store(&self, store_id: StoreId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.store_id != Some(store_id) {
            return Err(DomainError::validation("store mismatch for stock ledger"));
        }
        Ok(())
    }

    fn ensure_product(&self, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.product_id != Some(product_id) {
            return Err(DomainError::validation("product mismatch for stock ledger"));
        }
        Ok(())
    }

    fn handle_append(&self, cmd: &AppendEntry) -> Result<Vec<StockLedgerEvent>, DomainError> {
        self.ensure_store(cmd.store_id)?;
        self.ensure_product(cmd.product_id)?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("entry delta must be nonzero"));
        }
        match cmd.ref_type {
            LedgerRef::PoReceipt if cmd.delta < 0 => {
                return Err(DomainError::validation("receipt delta must be positive"));
            }
            LedgerRef::OrderConfirm if cmd.delta > 0 => {
                return Err(DomainError::validation("confirmation delta must be negative"));
            }
            LedgerRef::OrderCancel if cmd.delta < 0 => {
                return Err(DomainError::validation("cancellation delta must be positive"));
            }
            _ => {}
        }
        if let Some(cost) = cmd.unit_cost_paise
            && cost < 0
        {
            return Err(DomainError::validation("unit cost cannot be negative"));
        }

        let next = self
            .on_hand
            .checked_add(cmd.delta)
            .ok_or_else(|| DomainError::validation("entry delta overflows stock"))?;
        if cmd.ref_type.requires_non_negative() && next < 0 {
            return Err(DomainError::negative_stock(format!(
                "product {}: on hand {}, delta {}",
                cmd.product_id, self.on_hand, cmd.delta
            )));
        }

        Ok(vec![StockLedgerEvent::EntryAppended(StockEntryAppended {
            store_id: cmd.store_id,
            product_id: cmd.product_id,
            entry_id: cmd.entry_id,
            ref_type: cmd.ref_type,
            ref_id: cmd.ref_id,
            delta: cmd.delta,
            unit_cost_paise: cmd.unit_cost_paise,
            occurred_at: cmd.occurred_at,
        })])
    }
}
