use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use chrono::Utc;

use storeflow_catalog::{Product, ProductId, Supplier, SupplierId};
use storeflow_core::{Actor, ActorRole, AggregateId, ExpectedVersion, StoreId, UserId};
use storeflow_engine::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
use storeflow_engine::workflow::{STOCK_LEDGER_AGGREGATE, WorkflowEngine};
use storeflow_events::{EventEnvelope, InMemoryEventBus};
use storeflow_ledger::{LedgerRef, StockEntryAppended, StockLedgerEvent, StockLedgerId};
use storeflow_orders::{CustomerId, CustomerOrderId, CustomerOrderStatus, OrderLine, PaymentMethod};

type BenchEngine =
    WorkflowEngine<InMemoryEventStore, Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>>;

fn setup_engine() -> (BenchEngine, StoreId) {
    let engine = WorkflowEngine::new(InMemoryEventStore::new(), Arc::new(InMemoryEventBus::new()));
    (engine, StoreId::new())
}

fn owner() -> Actor {
    Actor::new(UserId::new(), ActorRole::StoreOwner)
}

fn seed_product(engine: &BenchEngine, store_id: StoreId, sku: String) -> ProductId {
    let product_id = ProductId::new(AggregateId::new());
    engine.register_product(
        store_id,
        Product {
            id: product_id,
            sku: sku.clone(),
            name: sku,
            reorder_point: 4,
            reorder_qty: 15,
            cost_price_paise: 500,
            supplier_id: None,
            active: true,
        },
    );
    product_id
}

fn bench_stock_adjustment_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("stock_adjustment_latency");
    group.sample_size(1000);

    // First entry on an untouched ledger stream.
    group.bench_function("fresh_ledger", |b| {
        let (engine, store_id) = setup_engine();
        let actor = owner();
        b.iter(|| {
            let product_id = ProductId::new(AggregateId::new());
            engine
                .adjust_stock(&actor, store_id, product_id, black_box(5), None)
                .unwrap();
        });
    });

    // Same product over and over: each call replays a growing ledger.
    group.bench_function("deep_ledger", |b| {
        let (engine, store_id) = setup_engine();
        let actor = owner();
        let product_id = ProductId::new(AggregateId::new());
        b.iter(|| {
            engine
                .adjust_stock(&actor, store_id, product_id, black_box(5), None)
                .unwrap();
        });
    });

    group.finish();
}

fn bench_ledger_append_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_append_throughput");

    for batch_size in [1, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("batch_append", batch_size),
            batch_size,
            |b, &size| {
                let store = InMemoryEventStore::new();
                let store_id = StoreId::new();
                let product_id = ProductId::new(AggregateId::new());
                let ledger_id = StockLedgerId::for_product(product_id);

                b.iter(|| {
                    let events: Vec<UncommittedEvent> = (0..size)
                        .map(|i| {
                            let event = StockLedgerEvent::EntryAppended(StockEntryAppended {
                                store_id,
                                product_id,
                                entry_id: uuid::Uuid::now_v7(),
                                ref_type: LedgerRef::PoReceipt,
                                ref_id: AggregateId::new(),
                                delta: i as i64 + 1,
                                unit_cost_paise: Some(500),
                                occurred_at: Utc::now(),
                            });
                            UncommittedEvent::from_typed(
                                store_id,
                                ledger_id.0,
                                STOCK_LEDGER_AGGREGATE,
                                uuid::Uuid::now_v7(),
                                &event,
                            )
                            .unwrap()
                        })
                        .collect();

                    black_box(store.append(events, ExpectedVersion::Any).unwrap());
                });
            },
        );
    }

    group.finish();
}

fn bench_order_confirmation(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_confirmation");
    group.sample_size(1000);

    // Register plus the full confirmation gate: availability check, ledger
    // append and order transition in one atomic batch.
    group.bench_function("register_and_confirm", |b| {
        let (engine, store_id) = setup_engine();
        let approver = owner();
        let shopper = Actor::new(UserId::new(), ActorRole::Customer);
        let product_id = seed_product(&engine, store_id, "SKU-BENCH".to_string());
        engine
            .adjust_stock(&approver, store_id, product_id, 50_000_000, None)
            .unwrap();

        b.iter(|| {
            let order_id = CustomerOrderId::new(AggregateId::new());
            engine
                .register_order(
                    &shopper,
                    store_id,
                    order_id,
                    CustomerId::new(AggregateId::new()),
                    format!("SO-{order_id}"),
                    PaymentMethod::CashOnDelivery,
                    CustomerOrderStatus::Pending,
                    vec![OrderLine {
                        product_id,
                        qty: 1,
                        price_snap_paise: 100,
                    }],
                )
                .unwrap();
            engine.confirm_order(&approver, store_id, order_id).unwrap();
        });
    });

    group.finish();
}

fn bench_stock_query_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("stock_query_depth");

    for depth in [10, 100, 1000].iter() {
        let (engine, store_id) = setup_engine();
        let actor = owner();
        let product_id = ProductId::new(AggregateId::new());
        for _ in 0..*depth {
            engine
                .adjust_stock(&actor, store_id, product_id, 1, None)
                .unwrap();
        }

        // Replaying the stream scales with depth, the cache does not.
        group.bench_with_input(BenchmarkId::new("ledger_replay", depth), depth, |b, _| {
            b.iter(|| black_box(engine.current_stock(store_id, product_id).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("cached_lookup", depth), depth, |b, _| {
            b.iter(|| black_box(engine.stock_level(store_id, &product_id)));
        });
    }

    group.finish();
}

fn bench_reorder_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("reorder_plan");

    for product_count in [100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("full_catalog_scan", product_count),
            product_count,
            |b, &count| {
                let (engine, store_id) = setup_engine();
                let actor = owner();
                let supplier_id = SupplierId::new(AggregateId::new());
                engine.register_supplier(
                    store_id,
                    Supplier {
                        id: supplier_id,
                        name: "Acme Traders".to_string(),
                        lead_time_days: 3,
                    },
                );
                for i in 0..count {
                    let product_id = ProductId::new(AggregateId::new());
                    engine.register_product(
                        store_id,
                        Product {
                            id: product_id,
                            sku: format!("SKU-{i}"),
                            name: format!("Product {i}"),
                            reorder_point: 4,
                            reorder_qty: 15,
                            cost_price_paise: 500,
                            supplier_id: Some(supplier_id),
                            active: true,
                        },
                    );
                    // Every other product is stocked above its point.
                    if i % 2 == 0 {
                        engine
                            .adjust_stock(&actor, store_id, product_id, 100, None)
                            .unwrap();
                    }
                }

                b.iter(|| black_box(engine.reorder_plan(&actor, store_id).unwrap()));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_stock_adjustment_latency,
    bench_ledger_append_throughput,
    bench_order_confirmation,
    bench_stock_query_depth,
    bench_reorder_plan
);
criterion_main!(benches);
