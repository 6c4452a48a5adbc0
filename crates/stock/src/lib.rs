//! Stock domain module: lot records and the append-only event ledger.
//!
//! This crate contains business rules for paper stock, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). The transactional
//! store that persists these types lives in `papermill-infra`.

pub mod aggregate;
pub mod event;
pub mod spec;
pub mod stock;

pub use aggregate::{Aggregates, aggregate};
pub use event::{PlanLink, PlanLinkRole, StockEvent, StockEventAction, StockEventStatus};
pub use spec::{PackagingType, StockSpec, pieces_from_weight};
pub use stock::Stock;
