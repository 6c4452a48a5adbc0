//! Infrastructure layer: the transactional store, services, and adapters.
//!
//! Domain crates stay pure; this crate owns row locking, transaction scopes,
//! the inbound service operations, read-side queries, and the outbound
//! invoice port wiring.

pub mod invoice_sink;
pub mod query;
pub mod retry;
pub mod stock_service;
pub mod store;
pub mod trade_service;
pub mod working_service;

#[cfg(test)]
mod integration_tests;

pub use invoice_sink::CollectingInvoiceSink;
pub use query::StockQueries;
pub use retry::{RetryPolicy, with_retry};
pub use stock_service::StockService;
pub use store::{InMemoryStore, PlanOutput, PlanRow, StockRow};
pub use trade_service::TradeService;
pub use working_service::WorkingService;
