//! Counter-party order lifecycle glue.
//!
//! Thin by design: every operation re-reads the order's status inside its
//! row scope and lets the transition table accept or reject the action.

use std::sync::Arc;

use tracing::info;

use papermill_core::{CompanyId, DomainResult, OrderId};
use papermill_trade::{Order, OrderOrigin, OrderedStock};

use crate::store::InMemoryStore;

pub struct TradeService {
    store: Arc<InMemoryStore>,
}

impl TradeService {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }

    pub fn create_order(
        &self,
        origin: OrderOrigin,
        src_company_id: CompanyId,
        dst_company_id: CompanyId,
        requested: OrderedStock,
    ) -> DomainResult<OrderId> {
        let order = Order::new(
            OrderId::new(),
            origin,
            src_company_id,
            dst_company_id,
            requested,
        )?;
        let order_id = order.id_typed();
        self.store.insert_order(order)?;
        info!(%order_id, ?origin, "order created");
        Ok(order_id)
    }

    pub fn request_order(&self, order_id: OrderId) -> DomainResult<()> {
        self.store.with_order(order_id, |order| order.request())?;
        info!(%order_id, "order requested");
        Ok(())
    }

    pub fn accept_order(&self, order_id: OrderId) -> DomainResult<()> {
        self.store.with_order(order_id, |order| order.accept())?;
        info!(%order_id, "order accepted");
        Ok(())
    }

    pub fn reject_order(&self, order_id: OrderId) -> DomainResult<()> {
        self.store.with_order(order_id, |order| order.reject())?;
        info!(%order_id, "order rejected");
        Ok(())
    }

    pub fn reset_order(&self, order_id: OrderId) -> DomainResult<()> {
        self.store.with_order(order_id, |order| order.reset())?;
        info!(%order_id, "order reset to preparing");
        Ok(())
    }

    pub fn cancel_order(&self, order_id: OrderId) -> DomainResult<()> {
        self.store.with_order(order_id, |order| order.cancel())?;
        info!(%order_id, "order cancelled");
        Ok(())
    }

    pub fn order(&self, order_id: OrderId) -> DomainResult<Order> {
        self.store.read_order(order_id)
    }
}
