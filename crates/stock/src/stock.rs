//! The stock record: identity + immutable spec + cached aggregates.

use serde::{Deserialize, Serialize};

use papermill_core::{CompanyId, DomainResult, Entity, StockId, WarehouseId};

use crate::aggregate::Aggregates;
use crate::spec::StockSpec;

/// A tracked lot of paper inventory.
///
/// The spec is immutable after creation. The cached quantity fields are a
/// derived view of the lot's event ledger and are written only by the
/// aggregator, inside the same transaction as the ledger write they reflect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    id: StockId,
    company_id: CompanyId,
    spec: StockSpec,
    /// None = unassigned / in-transit.
    warehouse_id: Option<WarehouseId>,
    /// Price in smallest currency unit per packaging unit.
    price: u64,
    cached_quantity: i64,
    cached_quantity_available: i64,
}

impl Stock {
    /// Register a lot entering the system (purchase, production output,
    /// inbound transform). The lot starts unplaced with empty aggregates;
    /// its quantities exist only as ledger rows.
    pub fn receive(
        id: StockId,
        company_id: CompanyId,
        spec: StockSpec,
        price: u64,
    ) -> DomainResult<Self> {
        spec.validate()?;
        Ok(Self {
            id,
            company_id,
            spec,
            warehouse_id: None,
            price,
            cached_quantity: 0,
            cached_quantity_available: 0,
        })
    }

    pub fn id_typed(&self) -> StockId {
        self.id
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn spec(&self) -> &StockSpec {
        &self.spec
    }

    pub fn warehouse_id(&self) -> Option<WarehouseId> {
        self.warehouse_id
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    /// Confirmed on-hand quantity: Σ delta over NORMAL rows.
    pub fn quantity(&self) -> i64 {
        self.cached_quantity
    }

    /// Available quantity: Σ delta over NORMAL + PENDING rows. Can sit above
    /// or below on-hand depending on whether pending rows are incoming
    /// arrivals or outgoing commitments.
    pub fn quantity_available(&self) -> i64 {
        self.cached_quantity_available
    }

    /// Place the lot in a warehouse (arrival accepted).
    pub fn place_in_warehouse(&mut self, warehouse_id: WarehouseId) {
        self.warehouse_id = Some(warehouse_id);
    }

    /// Write back freshly recomputed aggregates.
    ///
    /// Only the aggregator path may call this, inside the transaction that
    /// touched the lot's ledger.
    pub fn apply_aggregates(&mut self, aggregates: Aggregates) {
        self.cached_quantity = aggregates.quantity;
        self.cached_quantity_available = aggregates.available;
    }
}

impl Entity for Stock {
    type Id = StockId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::PackagingType;
    use papermill_core::ProductId;

    fn test_spec() -> StockSpec {
        StockSpec {
            product_id: ProductId::new(),
            packaging: PackagingType::Sheet,
            grammage: 80,
            size_x: 700,
            size_y: 1000,
            color: Some("white".to_string()),
            pattern: None,
            certification: None,
        }
    }

    #[test]
    fn received_stock_starts_unplaced_and_empty() {
        let stock = Stock::receive(StockId::new(), CompanyId::new(), test_spec(), 12_000).unwrap();
        assert_eq!(stock.warehouse_id(), None);
        assert_eq!(stock.quantity(), 0);
        assert_eq!(stock.quantity_available(), 0);
    }

    #[test]
    fn invalid_spec_is_rejected_at_receive() {
        let mut spec = test_spec();
        spec.size_x = 0;
        assert!(Stock::receive(StockId::new(), CompanyId::new(), spec, 0).is_err());
    }

    #[test]
    fn aggregates_write_back_onto_cached_fields() {
        let mut stock =
            Stock::receive(StockId::new(), CompanyId::new(), test_spec(), 12_000).unwrap();
        stock.apply_aggregates(Aggregates {
            quantity: 500,
            available: 320,
        });
        assert_eq!(stock.quantity(), 500);
        assert_eq!(stock.quantity_available(), 320);
    }
}
