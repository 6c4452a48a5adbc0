//! Read-side queries over provisional and confirmed rows.
//!
//! Disposable views for downstream read/reporting services; nothing here
//! mutates, and every row is read under its own lock at its latest
//! committed state.

use std::sync::Arc;

use papermill_core::{DomainResult, PlanId, ProductId, StockId, WarehouseId};
use papermill_stock::{Stock, StockEvent};

use crate::store::InMemoryStore;

pub struct StockQueries {
    store: Arc<InMemoryStore>,
}

impl StockQueries {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }

    pub fn stock(&self, stock_id: StockId) -> DomainResult<Stock> {
        self.store.read_stock(stock_id)
    }

    /// The full ledger of one lot, in append order.
    pub fn ledger(&self, stock_id: StockId) -> DomainResult<Vec<StockEvent>> {
        self.store
            .with_stock(stock_id, |row| Ok(row.events.clone()))
    }

    pub fn stocks_in_warehouse(&self, warehouse_id: WarehouseId) -> DomainResult<Vec<Stock>> {
        Ok(self
            .store
            .snapshot_stocks()?
            .into_iter()
            .filter(|s| s.warehouse_id() == Some(warehouse_id))
            .collect())
    }

    pub fn stocks_of_product(&self, product_id: ProductId) -> DomainResult<Vec<Stock>> {
        Ok(self
            .store
            .snapshot_stocks()?
            .into_iter()
            .filter(|s| s.spec().product_id == product_id)
            .collect())
    }

    /// Every ledger row tagged to one plan, assign and target sides both.
    pub fn events_for_plan(&self, plan_id: PlanId) -> DomainResult<Vec<StockEvent>> {
        Ok(self
            .store
            .snapshot_events()?
            .into_iter()
            .filter(|e| e.plan().is_some_and(|link| link.plan_id == plan_id))
            .collect())
    }
}
