//! The outbound shipping invoice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use papermill_core::{CompanyId, DomainResult, InvoiceId, OrderId, PlanId, TaskId};
use papermill_stock::PackagingType;

/// Shipping paperwork for one released output of an order-linked plan.
///
/// Carries the final spec + quantity the transformation engine settled on.
/// Issuing, carriers, and tax-authority integration belong to the shipping
/// subsystem consuming this value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub company_id: CompanyId,
    pub order_id: OrderId,
    pub plan_id: PlanId,
    pub task_id: TaskId,
    pub packaging: PackagingType,
    pub size_x: u32,
    pub size_y: u32,
    /// Grams for ROLL output, pieces otherwise.
    pub quantity: i64,
    pub issued_at: DateTime<Utc>,
}

/// Port consumed by the working service on RELEASE-task completion.
pub trait InvoiceSink: Send + Sync {
    fn submit(&self, invoice: Invoice) -> DomainResult<()>;
}

impl<S> InvoiceSink for std::sync::Arc<S>
where
    S: InvoiceSink + ?Sized,
{
    fn submit(&self, invoice: Invoice) -> DomainResult<()> {
        (**self).submit(invoice)
    }
}
