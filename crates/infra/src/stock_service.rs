//! Inbound receiving + warehousing workflow over the ledger.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use papermill_core::{
    CompanyId, DomainError, DomainResult, StockEventId, StockId, WarehouseId,
};
use papermill_stock::{PlanLink, Stock, StockEvent, StockEventStatus, StockSpec};

use crate::store::InMemoryStore;

/// Ledger-facing operations: lot intake, arrival acceptance, corrections.
pub struct StockService {
    store: Arc<InMemoryStore>,
}

impl StockService {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }

    /// Register a lot entering the system from the inbound-receiving
    /// workflow. The lot starts in transit (no warehouse) with one PENDING
    /// arrival row; [`StockService::accept_arrival`] places and confirms it.
    pub fn create_stock(
        &self,
        company_id: CompanyId,
        spec: StockSpec,
        initial_quantity: i64,
        price: u64,
    ) -> DomainResult<StockId> {
        if initial_quantity <= 0 {
            return Err(DomainError::validation("initial quantity must be positive"));
        }
        let stock = Stock::receive(StockId::new(), company_id, spec, price)?;
        let stock_id = stock.id_typed();
        let event = StockEvent::record(
            StockEventId::new(),
            stock_id,
            initial_quantity,
            StockEventStatus::Pending,
            None,
            Utc::now(),
        )?;
        let event_id = event.id_typed();

        self.store.insert_stock(stock)?;
        self.store.with_stock(stock_id, |row| {
            row.append(event);
            Ok(())
        })?;
        self.store.index_event(event_id, stock_id)?;

        info!(%stock_id, initial_quantity, "stock received");
        Ok(stock_id)
    }

    /// Append one ledger row and recompute aggregates, in one row scope.
    ///
    /// Consuming rows (negative delta) pre-check availability under the row
    /// lock and reject the whole transaction when the lot cannot cover them.
    pub fn record_event(
        &self,
        stock_id: StockId,
        delta: i64,
        status: StockEventStatus,
        plan: Option<PlanLink>,
    ) -> DomainResult<StockEventId> {
        let event_id = StockEventId::new();
        self.store.with_stock(stock_id, |row| {
            if delta < 0 {
                let available = row.stock.quantity_available();
                if -delta > available {
                    return Err(DomainError::insufficient_quantity(-delta, available));
                }
            }
            let event = StockEvent::record(event_id, stock_id, delta, status, plan, Utc::now())?;
            row.append(event);
            Ok(())
        })?;
        self.store.index_event(event_id, stock_id)?;
        Ok(event_id)
    }

    /// Warehousing workflow: confirm a PENDING arrival and place the lot.
    pub fn accept_arrival(
        &self,
        event_id: StockEventId,
        warehouse_id: WarehouseId,
    ) -> DomainResult<()> {
        let stock_id = self.store.stock_of_event(event_id)?;
        self.store.with_stock(stock_id, |row| {
            row.event_mut(event_id)?.confirm()?;
            row.stock.place_in_warehouse(warehouse_id);
            row.recompute();
            Ok(())
        })?;
        info!(%stock_id, %event_id, %warehouse_id, "arrival accepted");
        Ok(())
    }

    /// Correction reversal: cancel a PENDING or NORMAL row.
    pub fn cancel_event(&self, event_id: StockEventId) -> DomainResult<()> {
        let stock_id = self.store.stock_of_event(event_id)?;
        self.store.with_stock(stock_id, |row| {
            row.event_mut(event_id)?.cancel()?;
            row.recompute();
            Ok(())
        })?;
        info!(%stock_id, %event_id, "ledger row cancelled");
        Ok(())
    }
}
