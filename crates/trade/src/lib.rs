//! Trade domain module: the counter-party order lifecycle.
//!
//! A thin collaborator of the working module: it gates when a plan may
//! attach to a counter-party transaction, and nothing more. Pricing,
//! invoiceable amounts, and payment are out of scope.

pub mod order;

pub use order::{Order, OrderAction, OrderOrigin, OrderStatus, OrderedStock};
