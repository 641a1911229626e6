//! Stock ledger operations and the booking helper shared by order
//! confirmation, cancellation restock and purchase order receipt.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use storeflow_catalog::ProductId;
use storeflow_core::{Actor, ActorRole, AggregateId, DomainError, ExpectedVersion, StoreId};
use storeflow_events::{EventBus, EventEnvelope, execute};
use storeflow_ledger::{
    AppendEntry, LedgerRef, StockEntryAppended, StockLedgerCommand, StockLedgerEvent, StockLedgerId,
};

use crate::dispatcher::{WorkflowError, to_uncommitted, validate_loaded_stream};
use crate::event_store::{EventFilter, EventStore, StoredEvent, StreamAppend};
use crate::projections::StockLevelReadModel;

use super::{STOCK_LEDGER_AGGREGATE, WorkflowEngine};

/// One product short on an order confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsufficientItem {
    pub product_id: ProductId,
    /// Units the confirmation asked to take.
    pub requested: i64,
    /// Units on hand before the confirmation.
    pub available: i64,
}

/// Cache row disagreeing with its ledger stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDrift {
    pub product_id: ProductId,
    pub ledger_on_hand: i64,
    pub cached_on_hand: i64,
}

/// A stock movement one workflow decision wants booked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StockMovement {
    pub product_id: ProductId,
    pub ref_type: LedgerRef,
    pub ref_id: AggregateId,
    pub delta: i64,
    pub unit_cost_paise: Option<i64>,
}

/// Ledger side of a workflow decision: appends ready to commit, or the
/// complete list of products that came up short.
pub(crate) struct LedgerDecision {
    pub appends: Vec<StreamAppend>,
    pub shortfalls: Vec<InsufficientItem>,
}

pub(crate) fn insufficient_stock_error(shortfalls: &[InsufficientItem]) -> DomainError {
    let detail = shortfalls
        .iter()
        .map(|s| {
            format!(
                "product {}: requested {}, available {}",
                s.product_id, s.requested, s.available
            )
        })
        .collect::<Vec<_>>()
        .join("; ");
    DomainError::insufficient_stock(detail)
}

impl<S, B> WorkflowEngine<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Decide ledger appends for a set of movements without committing.
    ///
    /// Movements are grouped into one stream append per product and executed
    /// sequentially against the rehydrated ledger, so the non-negative floor
    /// sees the cumulative effect within the batch. A product that would go
    /// negative lands in `shortfalls` instead of `appends`; every product is
    /// still evaluated so the caller can report the complete list.
    pub(crate) fn decide_ledger_entries(
        &self,
        store_id: StoreId,
        movements: &[StockMovement],
        occurred_at: DateTime<Utc>,
    ) -> Result<LedgerDecision, WorkflowError> {
        let mut product_order: Vec<ProductId> = Vec::new();
        for m in movements {
            if !product_order.contains(&m.product_id) {
                product_order.push(m.product_id);
            }
        }

        let mut appends = Vec::new();
        let mut shortfalls = Vec::new();
        for product_id in product_order {
            let (mut ledger, version) = self.load_stock_ledger(store_id, product_id)?;
            let available = ledger.on_hand();

            let mut decided: Vec<StockLedgerEvent> = Vec::new();
            let mut short = false;
            for m in movements.iter().filter(|m| m.product_id == product_id) {
                let cmd = StockLedgerCommand::AppendEntry(AppendEntry {
                    store_id,
                    product_id,
                    entry_id: Uuid::now_v7(),
                    ref_type: m.ref_type,
                    ref_id: m.ref_id,
                    delta: m.delta,
                    unit_cost_paise: m.unit_cost_paise,
                    occurred_at,
                });
                match execute(&mut ledger, &cmd) {
                    Ok(events) => decided.extend(events),
                    Err(DomainError::NegativeStock(_)) => {
                        let requested: i64 = movements
                            .iter()
                            .filter(|m| m.product_id == product_id && m.delta < 0)
                            .map(|m| -m.delta)
                            .sum();
                        shortfalls.push(InsufficientItem {
                            product_id,
                            requested,
                            available,
                        });
                        short = true;
                        break;
                    }
                    Err(other) => return Err(other.into()),
                }
            }

            if !short && !decided.is_empty() {
                appends.push(StreamAppend {
                    expected_version: ExpectedVersion::Exact(version),
                    events: to_uncommitted(
                        store_id,
                        StockLedgerId::for_product(product_id).0,
                        STOCK_LEDGER_AGGREGATE,
                        &decided,
                    )?,
                });
            }
        }

        Ok(LedgerDecision {
            appends,
            shortfalls,
        })
    }

    /// Book a manual stock correction.
    ///
    /// The floor applies: a correction may take the ledger down to zero but
    /// never below, and the refusal surfaces as [`DomainError::NegativeStock`].
    pub fn adjust_stock(
        &self,
        actor: &Actor,
        store_id: StoreId,
        product_id: ProductId,
        delta: i64,
        unit_cost_paise: Option<i64>,
    ) -> Result<Vec<StoredEvent>, WorkflowError> {
        actor.require_role(ActorRole::StoreOwner)?;

        // One reference id per adjustment act, stable across retries.
        let adjustment_id = AggregateId::new();
        self.with_conflict_retry(|| {
            let (mut ledger, version) = self.load_stock_ledger(store_id, product_id)?;
            let cmd = StockLedgerCommand::AppendEntry(AppendEntry {
                store_id,
                product_id,
                entry_id: Uuid::now_v7(),
                ref_type: LedgerRef::ManualAdjustment,
                ref_id: adjustment_id,
                delta,
                unit_cost_paise,
                occurred_at: Utc::now(),
            });
            let decided = execute(&mut ledger, &cmd)?;

            self.commit(vec![StreamAppend {
                expected_version: ExpectedVersion::Exact(version),
                events: to_uncommitted(
                    store_id,
                    StockLedgerId::for_product(product_id).0,
                    STOCK_LEDGER_AGGREGATE,
                    &decided,
                )?,
            }])
        })
    }

    /// Authoritative on-hand figure: the replayed ledger sum, not the cache.
    pub fn current_stock(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<i64, WorkflowError> {
        let (ledger, _) = self.load_stock_ledger(store_id, product_id)?;
        Ok(ledger.on_hand())
    }

    /// Full movement history of one product, oldest first.
    pub fn stock_ledger_entries(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<Vec<StockEntryAppended>, WorkflowError> {
        let ledger_id = StockLedgerId::for_product(product_id);
        let mut history = self.store.load_stream(store_id, ledger_id.0)?;
        validate_loaded_stream(store_id, ledger_id.0, &history)?;
        history.sort_by_key(|e| e.sequence_number);

        let mut entries = Vec::with_capacity(history.len());
        for stored in history {
            let ev: StockLedgerEvent = serde_json::from_value(stored.payload)
                .map_err(|e| WorkflowError::Deserialize(e.to_string()))?;
            let StockLedgerEvent::EntryAppended(entry) = ev;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Cached stock level of one product.
    pub fn stock_level(
        &self,
        store_id: StoreId,
        product_id: &ProductId,
    ) -> Option<StockLevelReadModel> {
        self.stock_levels.get(store_id, product_id)
    }

    /// Cached stock levels of a store.
    pub fn list_stock_levels(&self, store_id: StoreId) -> Vec<StockLevelReadModel> {
        self.stock_levels.list(store_id)
    }

    /// Compare the stock cache against a fresh fold of every ledger stream.
    pub fn verify_stock_levels(&self, store_id: StoreId) -> Result<Vec<StockDrift>, WorkflowError> {
        let events = self.store.query_events(
            store_id,
            &EventFilter::for_aggregate_type(STOCK_LEDGER_AGGREGATE),
        )?;

        let mut totals: Vec<(ProductId, i64)> = Vec::new();
        for stored in &events {
            let ev: StockLedgerEvent = serde_json::from_value(stored.payload.clone())
                .map_err(|e| WorkflowError::Deserialize(e.to_string()))?;
            let StockLedgerEvent::EntryAppended(e) = ev;
            match totals.iter_mut().find(|(p, _)| *p == e.product_id) {
                Some((_, sum)) => *sum += e.delta,
                None => totals.push((e.product_id, e.delta)),
            }
        }

        let mut drifts = Vec::new();
        for (product_id, ledger_on_hand) in &totals {
            let cached = self
                .stock_levels
                .get(store_id, product_id)
                .map(|rm| rm.on_hand)
                .unwrap_or(0);
            if cached != *ledger_on_hand {
                drifts.push(StockDrift {
                    product_id: *product_id,
                    ledger_on_hand: *ledger_on_hand,
                    cached_on_hand: cached,
                });
            }
        }
        // Cache rows with no backing stream are drift too.
        for rm in self.stock_levels.list(store_id) {
            if rm.on_hand != 0 && !totals.iter().any(|(p, _)| *p == rm.product_id) {
                drifts.push(StockDrift {
                    product_id: rm.product_id,
                    ledger_on_hand: 0,
                    cached_on_hand: rm.on_hand,
                });
            }
        }

        Ok(drifts)
    }
}
