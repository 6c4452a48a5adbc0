//! Shipping boundary: the invoice emitted when released output leaves.

pub mod invoice;

pub use invoice::{Invoice, InvoiceSink};
