//! The quantity aggregator: cached totals derived from the ledger.
//!
//! The two cached sums on a stock row are a pure derived view of its event
//! ledger. The store recomputes them here inside the same transaction as any
//! ledger insert or status change, so after commit the cached fields always
//! equal the ledger-derived truth and no reader observes a mid-transaction
//! aggregate.
//!
//! Non-negativity of `available` is deliberately not enforced here; this is
//! a view, not a guard. Consuming callers pre-check availability under the
//! row lock and raise `InsufficientQuantity` before recording.

use serde::{Deserialize, Serialize};

use crate::event::{StockEvent, StockEventStatus};

/// Cached totals of one stock, derived from its ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Aggregates {
    /// Σ delta over NORMAL rows.
    pub quantity: i64,
    /// Σ delta over NORMAL + PENDING rows.
    pub available: i64,
}

/// Recompute both cached sums from the full ledger of one stock.
pub fn aggregate(events: &[StockEvent]) -> Aggregates {
    events
        .iter()
        .fold(Aggregates::default(), |mut acc, event| {
            match event.status() {
                StockEventStatus::Normal => {
                    acc.quantity += event.delta();
                    acc.available += event.delta();
                }
                StockEventStatus::Pending => {
                    acc.available += event.delta();
                }
                StockEventStatus::Cancelled => {}
            }
            acc
        })
}
