//! Integration tests for the full ledger + working pipeline.
//!
//! Tests: receiving → ledger → plan start → engine → task completion →
//! aggregates/invoices, including the concurrent-overdraw guarantee.

use std::sync::Arc;
use std::thread;

use papermill_core::{CompanyId, DomainError, PlanId, ProductId, StockEventId, StockId, TaskId, WarehouseId};
use papermill_stock::{PackagingType, StockEventStatus, StockSpec, aggregate};
use papermill_working::{PlanInput, PlanStatus, TaskKind};
use papermill_trade::{OrderOrigin, OrderedStock};

use crate::invoice_sink::CollectingInvoiceSink;
use crate::query::StockQueries;
use crate::stock_service::StockService;
use crate::store::InMemoryStore;
use crate::trade_service::TradeService;
use crate::working_service::WorkingService;

struct Harness {
    store: Arc<InMemoryStore>,
    stocks: StockService,
    working: Arc<WorkingService<Arc<CollectingInvoiceSink>>>,
    trade: TradeService,
    queries: StockQueries,
    sink: Arc<CollectingInvoiceSink>,
    company: CompanyId,
}

fn setup() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let sink = Arc::new(CollectingInvoiceSink::new());
    Harness {
        stocks: StockService::new(store.clone()),
        working: Arc::new(WorkingService::new(store.clone(), sink.clone())),
        trade: TradeService::new(store.clone()),
        queries: StockQueries::new(store.clone()),
        sink,
        company: CompanyId::new(),
        store,
    }
}

fn roll_spec() -> StockSpec {
    StockSpec {
        product_id: ProductId::new(),
        packaging: PackagingType::Roll,
        grammage: 100,
        size_x: 1000,
        size_y: 0,
        color: None,
        pattern: None,
        certification: None,
    }
}

/// Receive a roll lot and accept its arrival, returning id + arrival event.
fn place_roll(h: &Harness, grams: i64) -> (StockId, StockEventId) {
    let stock_id = h
        .stocks
        .create_stock(h.company, roll_spec(), grams, 25_000)
        .unwrap();
    let event_id = h.queries.ledger(stock_id).unwrap()[0].id_typed();
    h.stocks.accept_arrival(event_id, WarehouseId::new()).unwrap();
    (stock_id, event_id)
}

/// The reference tree: converting 700×1000 → guillotine 350×500 → release.
fn build_reference_tree(
    h: &Harness,
    plan_id: PlanId,
    release_quantity: i64,
) -> (TaskId, TaskId, TaskId) {
    let converting = h
        .working
        .add_task(plan_id, None, TaskKind::Converting { size_x: 700, size_y: 1000 })
        .unwrap();
    let guillotine = h
        .working
        .add_task(plan_id, Some(converting), TaskKind::Guillotine { size_x: 350, size_y: 500 })
        .unwrap();
    let release = h
        .working
        .add_task(plan_id, Some(guillotine), TaskKind::Release { quantity: release_quantity })
        .unwrap();
    (converting, guillotine, release)
}

#[test]
fn create_and_accept_arrival_moves_pending_to_normal() {
    let h = setup();
    let stock_id = h
        .stocks
        .create_stock(h.company, roll_spec(), 1_000, 0)
        .unwrap();

    let stock = h.queries.stock(stock_id).unwrap();
    assert_eq!(stock.quantity(), 0);
    assert_eq!(stock.quantity_available(), 1_000);
    assert_eq!(stock.warehouse_id(), None);

    let event_id = h.queries.ledger(stock_id).unwrap()[0].id_typed();
    let warehouse = WarehouseId::new();
    h.stocks.accept_arrival(event_id, warehouse).unwrap();

    let stock = h.queries.stock(stock_id).unwrap();
    assert_eq!(stock.quantity(), 1_000);
    assert_eq!(stock.quantity_available(), 1_000);
    assert_eq!(stock.warehouse_id(), Some(warehouse));
}

#[test]
fn cancelling_a_pending_row_changes_available_only() {
    let h = setup();
    let stock_id = h
        .stocks
        .create_stock(h.company, roll_spec(), 1_000, 0)
        .unwrap();
    let event_id = h.queries.ledger(stock_id).unwrap()[0].id_typed();

    h.stocks.cancel_event(event_id).unwrap();

    let stock = h.queries.stock(stock_id).unwrap();
    assert_eq!(stock.quantity(), 0);
    assert_eq!(stock.quantity_available(), 0);
}

#[test]
fn full_consumption_round_trip_restores_available_exactly() {
    let h = setup();
    let (stock_id, _) = place_roll(&h, 1_000);

    let consuming = h
        .stocks
        .record_event(stock_id, -1_000, StockEventStatus::Normal, None)
        .unwrap();
    assert_eq!(h.queries.stock(stock_id).unwrap().quantity_available(), 0);

    h.stocks.cancel_event(consuming).unwrap();
    let stock = h.queries.stock(stock_id).unwrap();
    assert_eq!(stock.quantity_available(), 1_000);
    assert_eq!(stock.quantity(), 1_000);
}

#[test]
fn overdraw_is_rejected_with_both_figures() {
    let h = setup();
    let (stock_id, _) = place_roll(&h, 500);

    let err = h
        .stocks
        .record_event(stock_id, -700, StockEventStatus::Normal, None)
        .unwrap_err();
    assert_eq!(
        err,
        DomainError::InsufficientQuantity {
            requested: 700,
            available: 500
        }
    );
}

#[test]
fn concurrent_consumers_cannot_jointly_overdraw() {
    let h = setup();
    let (shared_id, _) = place_roll(&h, 1_000);

    // A progressing plan over its own separate input lot.
    let (input_id, _) = place_roll(&h, 70_000_000);
    let plan_id = h
        .working
        .create_process_plan(h.company, PlanInput { stock_id: input_id, quantity: 70_000_000 })
        .unwrap();
    build_reference_tree(&h, plan_id, 3_000_000);
    h.working.start_plan(plan_id).unwrap();

    // Two workers each want 700 of the shared lot's 1,000.
    let mut handles = Vec::new();
    for _ in 0..2 {
        let working = h.working.clone();
        handles.push(thread::spawn(move || {
            working.register_input_stock(plan_id, shared_id, 700)
        }));
    }
    let results: Vec<_> = handles.into_iter().map(|j| j.join().unwrap()).collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let overdrawn = results
        .iter()
        .filter(|r| matches!(r, Err(DomainError::InsufficientQuantity { .. })))
        .count();
    assert_eq!(succeeded, 1);
    assert_eq!(overdrawn, 1);

    let stock = h.queries.stock(shared_id).unwrap();
    assert_eq!(stock.quantity_available(), 300);
    assert_eq!(stock.quantity(), 300);
}

#[test]
fn start_plan_reserves_input_and_materializes_provisional_output() {
    let h = setup();
    let (input_id, _) = place_roll(&h, 70_000_000);
    let plan_id = h
        .working
        .create_process_plan(h.company, PlanInput { stock_id: input_id, quantity: 70_000_000 })
        .unwrap();
    let (_, _, release) = build_reference_tree(&h, plan_id, 3_000_000);

    h.working.start_plan(plan_id).unwrap();

    // Input lot: on-hand untouched, availability consumed by the reservation.
    let input = h.queries.stock(input_id).unwrap();
    assert_eq!(input.quantity(), 70_000_000);
    assert_eq!(input.quantity_available(), 0);

    // Provisional output: min(3,000,000 declared, 4,000,000 implied).
    let output = h.working.output_of_task(release).unwrap();
    let provisional = h.queries.stock(output.stock_id).unwrap();
    assert_eq!(provisional.quantity(), 0);
    assert_eq!(provisional.quantity_available(), 3_000_000);
    assert_eq!(provisional.spec().packaging, PackagingType::Sheet);
    assert_eq!((provisional.spec().size_x, provisional.spec().size_y), (350, 500));

    assert_eq!(h.working.plan(plan_id).unwrap().status(), PlanStatus::Progressing);
}

#[test]
fn start_plan_rejects_overdraw_without_side_effects() {
    let h = setup();
    let (input_id, _) = place_roll(&h, 1_000);
    let plan_id = h
        .working
        .create_process_plan(h.company, PlanInput { stock_id: input_id, quantity: 5_000 })
        .unwrap();
    build_reference_tree(&h, plan_id, 1);

    let stocks_before = h.store.snapshot_stocks().unwrap().len();
    let err = h.working.start_plan(plan_id).unwrap_err();
    assert!(matches!(err, DomainError::InsufficientQuantity { .. }));

    assert_eq!(h.working.plan(plan_id).unwrap().status(), PlanStatus::Preparing);
    assert_eq!(h.store.snapshot_stocks().unwrap().len(), stocks_before);
    assert_eq!(h.queries.stock(input_id).unwrap().quantity_available(), 1_000);
}

#[test]
fn finish_task_enforces_parent_before_child() {
    let h = setup();
    let (input_id, _) = place_roll(&h, 70_000_000);
    let plan_id = h
        .working
        .create_process_plan(h.company, PlanInput { stock_id: input_id, quantity: 70_000_000 })
        .unwrap();
    let (converting, guillotine, release) = build_reference_tree(&h, plan_id, 3_000_000);
    h.working.start_plan(plan_id).unwrap();

    let err = h.working.finish_task(release).unwrap_err();
    assert!(matches!(err, DomainError::InvalidStateTransition { .. }));

    // The tree root has no parent; its child finishes right after it.
    h.working.finish_task(converting).unwrap();
    h.working.finish_task(guillotine).unwrap();
    h.working.finish_task(release).unwrap();

    // The provisional output is confirmed at the engine's final figure.
    let output = h.working.output_of_task(release).unwrap();
    let produced = h.queries.stock(output.stock_id).unwrap();
    assert_eq!(produced.quantity(), 3_000_000);
    assert_eq!(produced.quantity_available(), 3_000_000);

    h.working.complete_plan(plan_id).unwrap();
    assert_eq!(h.working.plan(plan_id).unwrap().status(), PlanStatus::Progressed);
}

#[test]
fn finishing_a_task_twice_is_rejected() {
    let h = setup();
    let (input_id, _) = place_roll(&h, 70_000_000);
    let plan_id = h
        .working
        .create_process_plan(h.company, PlanInput { stock_id: input_id, quantity: 70_000_000 })
        .unwrap();
    let (converting, ..) = build_reference_tree(&h, plan_id, 3_000_000);
    h.working.start_plan(plan_id).unwrap();

    h.working.finish_task(converting).unwrap();
    let err = h.working.finish_task(converting).unwrap_err();
    assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
}

#[test]
fn tree_mutation_is_rejected_once_the_plan_started() {
    let h = setup();
    let (input_id, _) = place_roll(&h, 70_000_000);
    let plan_id = h
        .working
        .create_process_plan(h.company, PlanInput { stock_id: input_id, quantity: 70_000_000 })
        .unwrap();
    build_reference_tree(&h, plan_id, 3_000_000);
    h.working.start_plan(plan_id).unwrap();

    let err = h
        .working
        .add_task(plan_id, None, TaskKind::Release { quantity: 1 })
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
}

#[test]
fn non_release_leaf_fails_start_fast() {
    let h = setup();
    let (input_id, _) = place_roll(&h, 70_000_000);
    let plan_id = h
        .working
        .create_process_plan(h.company, PlanInput { stock_id: input_id, quantity: 70_000_000 })
        .unwrap();
    h.working
        .add_task(plan_id, None, TaskKind::Converting { size_x: 700, size_y: 1000 })
        .unwrap();

    let err = h.working.start_plan(plan_id).unwrap_err();
    assert!(matches!(err, DomainError::Structural(_)));
    assert_eq!(h.working.plan(plan_id).unwrap().status(), PlanStatus::Preparing);
}

#[test]
fn task_reset_reopens_work_unless_children_finished() {
    let h = setup();
    let (input_id, _) = place_roll(&h, 70_000_000);
    let plan_id = h
        .working
        .create_process_plan(h.company, PlanInput { stock_id: input_id, quantity: 70_000_000 })
        .unwrap();
    let (converting, guillotine, _release) = build_reference_tree(&h, plan_id, 3_000_000);
    h.working.start_plan(plan_id).unwrap();

    h.working.start_task(converting).unwrap();
    h.working.reset_task(converting).unwrap();
    h.working.start_task(converting).unwrap();
    h.working.finish_task(converting).unwrap();

    h.working.start_task(guillotine).unwrap();
    h.working.finish_task(guillotine).unwrap();

    // Guillotine finished, so converting may no longer reset.
    let err = h.working.reset_task(converting).unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));
}

#[test]
fn creation_plan_registers_a_direct_target_lot() {
    let h = setup();
    let mut spec = roll_spec();
    spec.packaging = PackagingType::Sheet;
    spec.size_y = 700;
    let (plan_id, stock_id) = h
        .working
        .create_creation_plan(h.company, spec, 40_000, 9_000)
        .unwrap();

    // No engine side effect at start.
    h.working.start_plan(plan_id).unwrap();
    let stock = h.queries.stock(stock_id).unwrap();
    assert_eq!(stock.quantity(), 0);
    assert_eq!(stock.quantity_available(), 40_000);

    let event_id = h.working.plan(plan_id).unwrap().target_event_id().unwrap();
    h.stocks.accept_arrival(event_id, WarehouseId::new()).unwrap();
    assert_eq!(h.queries.stock(stock_id).unwrap().quantity(), 40_000);

    h.working.complete_plan(plan_id).unwrap();
}

#[test]
fn order_gates_the_trade_plan_and_release_emits_an_invoice() {
    let h = setup();
    let buyer = CompanyId::new();
    let order_id = h
        .trade
        .create_order(
            OrderOrigin::Order,
            buyer,
            h.company,
            OrderedStock {
                spec: StockSpec {
                    packaging: PackagingType::Sheet,
                    size_y: 500,
                    size_x: 350,
                    ..roll_spec()
                },
                quantity: 3_000_000,
            },
        )
        .unwrap();

    let (input_id, _) = place_roll(&h, 70_000_000);
    let input = PlanInput { stock_id: input_id, quantity: 70_000_000 };

    // Not accepted yet: the 1:1 attachment is rejected.
    let err = h
        .working
        .create_trade_plan(order_id, h.company, input)
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidStateTransition { .. }));

    h.trade.request_order(order_id).unwrap();
    h.trade.accept_order(order_id).unwrap();
    let plan_id = h
        .working
        .create_trade_plan(order_id, h.company, input)
        .unwrap();
    assert_eq!(h.trade.order(order_id).unwrap().plan_id(), Some(plan_id));

    // A second plan cannot share the order.
    let err = h
        .working
        .create_trade_plan(order_id, h.company, input)
        .unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));

    let (converting, guillotine, release) = build_reference_tree(&h, plan_id, 3_000_000);
    h.working.start_plan(plan_id).unwrap();
    h.working.finish_task(converting).unwrap();
    h.working.finish_task(guillotine).unwrap();
    h.working.finish_task(release).unwrap();

    let invoices = h.sink.submitted();
    assert_eq!(invoices.len(), 1);
    let invoice = &invoices[0];
    assert_eq!(invoice.order_id, order_id);
    assert_eq!(invoice.plan_id, plan_id);
    assert_eq!(invoice.quantity, 3_000_000);
    assert_eq!(invoice.packaging, PackagingType::Sheet);
    assert_eq!((invoice.size_x, invoice.size_y), (350, 500));
}

#[test]
fn rejected_order_admits_no_plan() {
    let h = setup();
    let order_id = h
        .trade
        .create_order(
            OrderOrigin::Offer,
            h.company,
            CompanyId::new(),
            OrderedStock {
                spec: StockSpec {
                    packaging: PackagingType::Sheet,
                    size_y: 500,
                    ..roll_spec()
                },
                quantity: 1_000,
            },
        )
        .unwrap();
    h.trade.request_order(order_id).unwrap();
    h.trade.reject_order(order_id).unwrap();

    let (input_id, _) = place_roll(&h, 70_000_000);
    let err = h
        .working
        .create_trade_plan(
            order_id,
            h.company,
            PlanInput { stock_id: input_id, quantity: 1_000 },
        )
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
}

#[test]
fn cached_aggregates_match_the_ledger_after_every_flow() {
    let h = setup();

    // Run a full mixed flow, then audit every lot.
    let (input_id, _) = place_roll(&h, 70_000_000);
    let plan_id = h
        .working
        .create_process_plan(h.company, PlanInput { stock_id: input_id, quantity: 70_000_000 })
        .unwrap();
    let (converting, guillotine, release) = build_reference_tree(&h, plan_id, 3_000_000);
    h.working.start_plan(plan_id).unwrap();
    h.working.finish_task(converting).unwrap();
    h.working.finish_task(guillotine).unwrap();
    h.working.finish_task(release).unwrap();
    h.working.complete_plan(plan_id).unwrap();

    let (side_id, _) = place_roll(&h, 1_000);
    let consuming = h
        .stocks
        .record_event(side_id, -400, StockEventStatus::Normal, None)
        .unwrap();
    h.stocks.cancel_event(consuming).unwrap();

    for stock in h.store.snapshot_stocks().unwrap() {
        let ledger = h.queries.ledger(stock.id_typed()).unwrap();
        let truth = aggregate(&ledger);
        assert_eq!(stock.quantity(), truth.quantity, "stock {}", stock.id_typed());
        assert_eq!(
            stock.quantity_available(),
            truth.available,
            "stock {}",
            stock.id_typed()
        );
    }
}

#[test]
fn plan_events_are_queryable_by_plan() {
    let h = setup();
    let (input_id, _) = place_roll(&h, 70_000_000);
    let plan_id = h
        .working
        .create_process_plan(h.company, PlanInput { stock_id: input_id, quantity: 70_000_000 })
        .unwrap();
    build_reference_tree(&h, plan_id, 3_000_000);
    h.working.start_plan(plan_id).unwrap();

    let events = h.queries.events_for_plan(plan_id).unwrap();
    // One assign reservation + one provisional target.
    assert_eq!(events.len(), 2);
    assert!(events.iter().any(|e| e.delta() < 0));
    assert!(events.iter().any(|e| e.delta() > 0));
}
