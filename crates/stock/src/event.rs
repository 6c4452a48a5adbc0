//! The stock event ledger row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use papermill_core::{
    DomainError, DomainResult, Entity, PlanId, StateMachine, StockEventId, StockId, TaskId,
};

/// Lifecycle status of one ledger row.
///
/// PENDING rows are provisional (in-transit arrivals, reserved consumption,
/// unfinished work output); NORMAL rows are confirmed truth; CANCELLED rows
/// are reversed and terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockEventStatus {
    Pending,
    Normal,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockEventAction {
    Confirm,
    Cancel,
}

impl StateMachine for StockEventStatus {
    type Action = StockEventAction;

    const ENTITY: &'static str = "stock event";
    const TABLE: &'static [(Self, StockEventAction, Self)] = &[
        (
            StockEventStatus::Pending,
            StockEventAction::Confirm,
            StockEventStatus::Normal,
        ),
        (
            StockEventStatus::Pending,
            StockEventAction::Cancel,
            StockEventStatus::Cancelled,
        ),
        (
            StockEventStatus::Normal,
            StockEventAction::Cancel,
            StockEventStatus::Cancelled,
        ),
    ];
    const TERMINAL: &'static [Self] = &[StockEventStatus::Cancelled];
}

/// Which side of a plan a ledger row is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanLinkRole {
    /// Consumed input.
    Assign,
    /// Produced output.
    Target,
}

/// Optional tag binding a ledger row to the plan (and task) that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLink {
    pub plan_id: PlanId,
    pub task_id: Option<TaskId>,
    pub role: PlanLinkRole,
}

/// One signed quantity movement against a stock; the ledger's unit of truth.
///
/// Rows are append-only facts: never deleted, and only `status` mutates,
/// through the [`StockEventStatus`] transition table. Corrections are new
/// rows, not updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEvent {
    id: StockEventId,
    stock_id: StockId,
    /// Grams for ROLL stock, pieces otherwise. Negative = consumption.
    delta: i64,
    status: StockEventStatus,
    plan: Option<PlanLink>,
    occurred_at: DateTime<Utc>,
}

impl StockEvent {
    /// Record a new ledger row.
    ///
    /// Rows enter as PENDING or NORMAL; a row cannot be born CANCELLED.
    pub fn record(
        id: StockEventId,
        stock_id: StockId,
        delta: i64,
        status: StockEventStatus,
        plan: Option<PlanLink>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        if status == StockEventStatus::Cancelled {
            return Err(DomainError::validation(
                "a ledger row cannot be recorded as cancelled",
            ));
        }
        Ok(Self {
            id,
            stock_id,
            delta,
            status,
            plan,
            occurred_at,
        })
    }

    pub fn id_typed(&self) -> StockEventId {
        self.id
    }

    pub fn stock_id(&self) -> StockId {
        self.stock_id
    }

    pub fn delta(&self) -> i64 {
        self.delta
    }

    pub fn status(&self) -> StockEventStatus {
        self.status
    }

    pub fn plan(&self) -> Option<&PlanLink> {
        self.plan.as_ref()
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// PENDING → NORMAL (arrival accepted, work output finalized).
    pub fn confirm(&mut self) -> DomainResult<()> {
        self.status = self.status.apply(StockEventAction::Confirm)?;
        Ok(())
    }

    /// PENDING/NORMAL → CANCELLED (reversal/correction).
    pub fn cancel(&mut self) -> DomainResult<()> {
        self.status = self.status.apply(StockEventAction::Cancel)?;
        Ok(())
    }
}

impl Entity for StockEvent {
    type Id = StockEventId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
