//! In-memory transactional store.
//!
//! Stand-in for the shared relational store: multiple request-handling
//! workers run against it concurrently and nothing else serializes stock
//! mutation. Every stock row is therefore guarded by its own mutex, the
//! `SELECT ... FOR UPDATE` equivalent. An operation that reads a lot's cached
//! aggregates to decide availability and then writes ledger rows does both
//! inside one [`InMemoryStore::with_stock`] scope, so two concurrent
//! consumers cannot both observe stale availability and jointly overdraw
//! the lot. Plan and order rows get the same per-row treatment.
//!
//! Transaction discipline inside a row scope is check-then-mutate: closures
//! perform every fallible check before the first write, so an error leaves
//! the row untouched and no partial state (event without recomputed
//! aggregates) is ever observable.
//!
//! Poisoned locks surface as `TransientStore`; callers may retry the whole
//! operation through [`crate::retry::with_retry`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use papermill_core::{DomainError, DomainResult, OrderId, PlanId, StockEventId, StockId, TaskId};
use papermill_stock::{Stock, StockEvent, aggregate};
use papermill_trade::Order;
use papermill_working::{Plan, TaskArena};

/// One lot + its full ledger, mutated only under the row lock.
#[derive(Debug)]
pub struct StockRow {
    pub stock: Stock,
    pub events: Vec<StockEvent>,
}

impl StockRow {
    /// Append a ledger row and recompute the cached aggregates in the same
    /// lock scope.
    pub fn append(&mut self, event: StockEvent) {
        self.events.push(event);
        self.recompute();
    }

    /// Recompute the cached aggregates from the ledger.
    pub fn recompute(&mut self) {
        self.stock.apply_aggregates(aggregate(&self.events));
    }

    pub fn event_mut(&mut self, event_id: StockEventId) -> DomainResult<&mut StockEvent> {
        self.events
            .iter_mut()
            .find(|e| e.id_typed() == event_id)
            .ok_or(DomainError::NotFound)
    }
}

/// One plan + its task tree + the provisional outputs recorded at start.
#[derive(Debug)]
pub struct PlanRow {
    pub plan: Plan,
    pub tasks: TaskArena,
    pub outputs: HashMap<TaskId, PlanOutput>,
}

/// Where a release task's provisional output landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOutput {
    pub stock_id: StockId,
    pub event_id: StockEventId,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    stocks: RwLock<HashMap<StockId, Arc<Mutex<StockRow>>>>,
    event_index: RwLock<HashMap<StockEventId, StockId>>,
    plans: RwLock<HashMap<PlanId, Arc<Mutex<PlanRow>>>>,
    task_index: RwLock<HashMap<TaskId, PlanId>>,
    orders: RwLock<HashMap<OrderId, Arc<Mutex<Order>>>>,
}

fn poisoned(what: &str) -> DomainError {
    DomainError::transient(format!("{what} lock poisoned"))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_stock(&self, stock: Stock) -> DomainResult<()> {
        let mut stocks = self.stocks.write().map_err(|_| poisoned("stock table"))?;
        let id = stock.id_typed();
        if stocks.contains_key(&id) {
            return Err(DomainError::conflict("stock already exists"));
        }
        stocks.insert(
            id,
            Arc::new(Mutex::new(StockRow {
                stock,
                events: Vec::new(),
            })),
        );
        Ok(())
    }

    fn stock_handle(&self, id: StockId) -> DomainResult<Arc<Mutex<StockRow>>> {
        let stocks = self.stocks.read().map_err(|_| poisoned("stock table"))?;
        stocks.get(&id).cloned().ok_or(DomainError::NotFound)
    }

    /// Run `f` holding the row lock: the transaction scope for one lot.
    pub fn with_stock<R>(
        &self,
        id: StockId,
        f: impl FnOnce(&mut StockRow) -> DomainResult<R>,
    ) -> DomainResult<R> {
        let handle = self.stock_handle(id)?;
        let mut row = handle.lock().map_err(|_| poisoned("stock row"))?;
        f(&mut row)
    }

    pub fn read_stock(&self, id: StockId) -> DomainResult<Stock> {
        self.with_stock(id, |row| Ok(row.stock.clone()))
    }

    pub fn index_event(&self, event_id: StockEventId, stock_id: StockId) -> DomainResult<()> {
        let mut index = self
            .event_index
            .write()
            .map_err(|_| poisoned("event index"))?;
        index.insert(event_id, stock_id);
        Ok(())
    }

    pub fn stock_of_event(&self, event_id: StockEventId) -> DomainResult<StockId> {
        let index = self
            .event_index
            .read()
            .map_err(|_| poisoned("event index"))?;
        index.get(&event_id).copied().ok_or(DomainError::NotFound)
    }

    pub fn insert_plan(&self, plan: Plan) -> DomainResult<()> {
        let mut plans = self.plans.write().map_err(|_| poisoned("plan table"))?;
        let id = plan.id_typed();
        if plans.contains_key(&id) {
            return Err(DomainError::conflict("plan already exists"));
        }
        plans.insert(
            id,
            Arc::new(Mutex::new(PlanRow {
                plan,
                tasks: TaskArena::new(),
                outputs: HashMap::new(),
            })),
        );
        Ok(())
    }

    fn plan_handle(&self, id: PlanId) -> DomainResult<Arc<Mutex<PlanRow>>> {
        let plans = self.plans.read().map_err(|_| poisoned("plan table"))?;
        plans.get(&id).cloned().ok_or(DomainError::NotFound)
    }

    /// Run `f` holding the plan row lock. Stock row locks nest inside plan
    /// row locks, never the other way around.
    pub fn with_plan<R>(
        &self,
        id: PlanId,
        f: impl FnOnce(&mut PlanRow) -> DomainResult<R>,
    ) -> DomainResult<R> {
        let handle = self.plan_handle(id)?;
        let mut row = handle.lock().map_err(|_| poisoned("plan row"))?;
        f(&mut row)
    }

    pub fn read_plan(&self, id: PlanId) -> DomainResult<Plan> {
        self.with_plan(id, |row| Ok(row.plan.clone()))
    }

    pub fn index_task(&self, task_id: TaskId, plan_id: PlanId) -> DomainResult<()> {
        let mut index = self.task_index.write().map_err(|_| poisoned("task index"))?;
        index.insert(task_id, plan_id);
        Ok(())
    }

    pub fn plan_of_task(&self, task_id: TaskId) -> DomainResult<PlanId> {
        let index = self.task_index.read().map_err(|_| poisoned("task index"))?;
        index.get(&task_id).copied().ok_or(DomainError::NotFound)
    }

    pub fn insert_order(&self, order: Order) -> DomainResult<()> {
        let mut orders = self.orders.write().map_err(|_| poisoned("order table"))?;
        let id = order.id_typed();
        if orders.contains_key(&id) {
            return Err(DomainError::conflict("order already exists"));
        }
        orders.insert(id, Arc::new(Mutex::new(order)));
        Ok(())
    }

    fn order_handle(&self, id: OrderId) -> DomainResult<Arc<Mutex<Order>>> {
        let orders = self.orders.read().map_err(|_| poisoned("order table"))?;
        orders.get(&id).cloned().ok_or(DomainError::NotFound)
    }

    /// Run `f` holding the order row lock. Every mutating order operation
    /// re-reads current status inside this scope.
    pub fn with_order<R>(
        &self,
        id: OrderId,
        f: impl FnOnce(&mut Order) -> DomainResult<R>,
    ) -> DomainResult<R> {
        let handle = self.order_handle(id)?;
        let mut order = handle.lock().map_err(|_| poisoned("order row"))?;
        f(&mut order)
    }

    pub fn read_order(&self, id: OrderId) -> DomainResult<Order> {
        self.with_order(id, |order| Ok(order.clone()))
    }

    /// Consistent-per-row snapshot of all stocks, for the read side.
    pub fn snapshot_stocks(&self) -> DomainResult<Vec<Stock>> {
        let handles: Vec<_> = {
            let stocks = self.stocks.read().map_err(|_| poisoned("stock table"))?;
            stocks.values().cloned().collect()
        };
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            let row = handle.lock().map_err(|_| poisoned("stock row"))?;
            out.push(row.stock.clone());
        }
        Ok(out)
    }

    /// Consistent-per-row snapshot of all ledger rows, for the read side.
    pub fn snapshot_events(&self) -> DomainResult<Vec<StockEvent>> {
        let handles: Vec<_> = {
            let stocks = self.stocks.read().map_err(|_| poisoned("stock table"))?;
            stocks.values().cloned().collect()
        };
        let mut out = Vec::new();
        for handle in handles {
            let row = handle.lock().map_err(|_| poisoned("stock row"))?;
            out.extend(row.events.iter().cloned());
        }
        Ok(out)
    }
}
