//! In-memory invoice sink.
//!
//! Intended for tests/dev; the production sink is the shipping subsystem.

use std::sync::Mutex;

use papermill_core::{DomainError, DomainResult};
use papermill_shipping::{Invoice, InvoiceSink};

/// Collects every submitted invoice.
#[derive(Debug, Default)]
pub struct CollectingInvoiceSink {
    invoices: Mutex<Vec<Invoice>>,
}

impl CollectingInvoiceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> Vec<Invoice> {
        self.invoices
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

impl InvoiceSink for CollectingInvoiceSink {
    fn submit(&self, invoice: Invoice) -> DomainResult<()> {
        let mut invoices = self
            .invoices
            .lock()
            .map_err(|_| DomainError::transient("invoice sink lock poisoned"))?;
        invoices.push(invoice);
        Ok(())
    }
}
