//! Workflow engine: multi-aggregate operations over one event store.
//!
//! Aggregates decide; the engine sequences. Each operation loads the streams
//! it touches, lets the aggregates produce events, commits every stream of
//! the decision as one atomic batch, then feeds the committed envelopes to
//! the projections and the bus. A lost optimistic concurrency race is retried
//! with freshly loaded state, so the second writer re-decides against what
//! the winner committed and receives the domain answer (an already-processed
//! duplicate, an insufficient-stock refusal) instead of a raw version
//! conflict.

mod orders;
mod purchasing;
mod replenishment;
mod stock;

pub use stock::{InsufficientItem, StockDrift};

use std::sync::Arc;

use serde_json::Value as JsonValue;

use storeflow_catalog::{Product, ProductId, Supplier, SupplierId};
use storeflow_core::StoreId;
use storeflow_events::{EventBus, EventEnvelope};
use storeflow_ledger::{StockLedger, StockLedgerId};
use storeflow_orders::{CustomerOrder, CustomerOrderId};
use storeflow_purchasing::{PurchaseOrder, PurchaseOrderId};

use crate::dispatcher::{WorkflowError, rehydrate, stream_version, validate_loaded_stream};
use crate::event_store::{EventFilter, EventStore, StoredEvent, StreamAppend};
use crate::projections::{
    CustomerOrderReadModel, CustomerOrdersProjection, PurchaseOrderReadModel,
    PurchaseOrdersProjection, StockLevelReadModel, StockLevelsProjection,
};
use crate::read_model::{InMemoryStoreIndex, StoreIndex};

/// Aggregate type tag for purchase order streams.
pub const PURCHASE_ORDER_AGGREGATE: &str = "purchasing.po";
/// Aggregate type tag for customer order streams.
pub const CUSTOMER_ORDER_AGGREGATE: &str = "orders.order";
/// Aggregate type tag for stock ledger streams.
pub const STOCK_LEDGER_AGGREGATE: &str = "ledger.stock";

/// Attempts per operation before a conflict is surfaced to the caller.
const MAX_CONFLICT_RETRIES: usize = 5;

type StockIndex = Arc<InMemoryStoreIndex<ProductId, StockLevelReadModel>>;
type PurchaseOrderIndex = Arc<InMemoryStoreIndex<PurchaseOrderId, PurchaseOrderReadModel>>;
type CustomerOrderIndex = Arc<InMemoryStoreIndex<CustomerOrderId, CustomerOrderReadModel>>;

/// Application engine for the purchasing, ordering and stock workflows of
/// one event store.
///
/// Composes an [`EventStore`] and an [`EventBus`] with the product/supplier
/// directories and the read-model projections. Every mutation follows the
/// same shape: load, decide, append atomically, project, publish. Generic
/// over the store and bus so tests run fully in memory.
#[derive(Debug)]
pub struct WorkflowEngine<S, B> {
    store: S,
    bus: B,
    products: Arc<InMemoryStoreIndex<ProductId, Product>>,
    suppliers: Arc<InMemoryStoreIndex<SupplierId, Supplier>>,
    stock_levels: StockLevelsProjection<StockIndex>,
    purchase_orders: PurchaseOrdersProjection<PurchaseOrderIndex>,
    customer_orders: CustomerOrdersProjection<CustomerOrderIndex>,
}

impl<S, B> WorkflowEngine<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            products: Arc::new(InMemoryStoreIndex::new()),
            suppliers: Arc::new(InMemoryStoreIndex::new()),
            stock_levels: StockLevelsProjection::new(Arc::new(InMemoryStoreIndex::new())),
            purchase_orders: PurchaseOrdersProjection::new(Arc::new(InMemoryStoreIndex::new())),
            customer_orders: CustomerOrdersProjection::new(Arc::new(InMemoryStoreIndex::new())),
        }
    }

    /// Register or update a product in the store's directory.
    pub fn register_product(&self, store_id: StoreId, product: Product) {
        self.products.upsert(store_id, product.id, product);
    }

    /// Register or update a supplier in the store's directory.
    pub fn register_supplier(&self, store_id: StoreId, supplier: Supplier) {
        self.suppliers.upsert(store_id, supplier.id, supplier);
    }

    pub fn product(&self, store_id: StoreId, product_id: &ProductId) -> Option<Product> {
        self.products.get(store_id, product_id)
    }

    pub fn supplier(&self, store_id: StoreId, supplier_id: &SupplierId) -> Option<Supplier> {
        self.suppliers.get(store_id, supplier_id)
    }

    /// All products of a store, ordered by sku.
    pub fn products(&self, store_id: StoreId) -> Vec<Product> {
        let mut products = self.products.list(store_id);
        products.sort_by(|a, b| a.sku.cmp(&b.sku));
        products
    }
}

impl<S, B> WorkflowEngine<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Run `attempt` until it returns anything other than a retryable
    /// concurrency conflict, up to the retry budget. Each attempt reloads
    /// state, so a loser of an append race re-decides on the winner's
    /// committed stream.
    pub(crate) fn with_conflict_retry<T>(
        &self,
        mut attempt: impl FnMut() -> Result<T, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        let mut last = WorkflowError::Concurrency("no attempt made".to_string());
        for _ in 0..MAX_CONFLICT_RETRIES {
            match attempt() {
                Err(e) if e.is_retryable() => {
                    tracing::debug!(error = %e, "optimistic conflict, reloading and retrying");
                    last = e;
                }
                other => return other,
            }
        }
        Err(last)
    }

    /// Commit a decided batch: append atomically, then project and publish
    /// each stored event.
    pub(crate) fn commit(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, WorkflowError> {
        let committed = self.store.append_batch(batch)?;

        for stored in &committed {
            let envelope = stored.to_envelope();
            self.apply_to_projections(&envelope);
            self.bus
                .publish(envelope)
                .map_err(|e| WorkflowError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }

    /// A rejected envelope leaves that read model stale until the next
    /// rebuild; the committed streams are unaffected.
    fn apply_to_projections(&self, envelope: &EventEnvelope<JsonValue>) {
        if let Err(e) = self.stock_levels.apply_envelope(envelope) {
            tracing::warn!(error = %e, "stock levels projection rejected envelope");
        }
        if let Err(e) = self.purchase_orders.apply_envelope(envelope) {
            tracing::warn!(error = %e, "purchase orders projection rejected envelope");
        }
        if let Err(e) = self.customer_orders.apply_envelope(envelope) {
            tracing::warn!(error = %e, "customer orders projection rejected envelope");
        }
    }

    pub(crate) fn load_purchase_order(
        &self,
        store_id: StoreId,
        order_id: PurchaseOrderId,
    ) -> Result<(PurchaseOrder, u64), WorkflowError> {
        let history = self.store.load_stream(store_id, order_id.0)?;
        validate_loaded_stream(store_id, order_id.0, &history)?;
        let version = stream_version(&history);

        let mut order = PurchaseOrder::empty(order_id);
        rehydrate(&mut order, &history)?;
        Ok((order, version))
    }

    pub(crate) fn load_customer_order(
        &self,
        store_id: StoreId,
        order_id: CustomerOrderId,
    ) -> Result<(CustomerOrder, u64), WorkflowError> {
        let history = self.store.load_stream(store_id, order_id.0)?;
        validate_loaded_stream(store_id, order_id.0, &history)?;
        let version = stream_version(&history);

        let mut order = CustomerOrder::empty(order_id);
        rehydrate(&mut order, &history)?;
        Ok((order, version))
    }

    pub(crate) fn load_stock_ledger(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<(StockLedger, u64), WorkflowError> {
        let ledger_id = StockLedgerId::for_product(product_id);
        let history = self.store.load_stream(store_id, ledger_id.0)?;
        validate_loaded_stream(store_id, ledger_id.0, &history)?;
        let version = stream_version(&history);

        let mut ledger = StockLedger::empty(ledger_id);
        rehydrate(&mut ledger, &history)?;
        Ok((ledger, version))
    }

    /// Rebuild every read model of a store from its committed events.
    pub fn rebuild_read_models(&self, store_id: StoreId) -> Result<(), WorkflowError> {
        let events = self.store.query_events(store_id, &EventFilter::default())?;
        let envelopes: Vec<EventEnvelope<JsonValue>> =
            events.iter().map(StoredEvent::to_envelope).collect();

        self.stock_levels
            .rebuild_from_scratch(envelopes.iter().cloned())?;
        self.purchase_orders
            .rebuild_from_scratch(envelopes.iter().cloned())?;
        self.customer_orders.rebuild_from_scratch(envelopes)?;

        tracing::info!(%store_id, "read models rebuilt from the event log");
        Ok(())
    }
}
