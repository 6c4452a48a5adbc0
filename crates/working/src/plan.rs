//! The plan: one unit of work over an input lot.

use serde::{Deserialize, Serialize};

use papermill_core::{
    CompanyId, DomainError, DomainResult, Entity, OrderId, PlanId, StateMachine, StockEventId,
    StockId,
};

/// What a plan is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanKind {
    /// Registers a lot directly; no task tree, at most one direct target event.
    Creation,
    /// Transforms an input lot through a task tree.
    Process,
    /// A process plan bound 1:1 to an accepted counter-party order.
    Trade { order_id: OrderId },
}

impl PlanKind {
    pub fn order_id(self) -> Option<OrderId> {
        match self {
            PlanKind::Trade { order_id } => Some(order_id),
            _ => None,
        }
    }

    /// Whether plans of this kind carry a task tree.
    pub fn has_tasks(self) -> bool {
        !matches!(self, PlanKind::Creation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Preparing,
    Progressing,
    Progressed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanAction {
    Start,
    Complete,
    Cancel,
}

impl StateMachine for PlanStatus {
    type Action = PlanAction;

    const ENTITY: &'static str = "plan";
    const TABLE: &'static [(Self, PlanAction, Self)] = &[
        (PlanStatus::Preparing, PlanAction::Start, PlanStatus::Progressing),
        (
            PlanStatus::Progressing,
            PlanAction::Complete,
            PlanStatus::Progressed,
        ),
        (PlanStatus::Preparing, PlanAction::Cancel, PlanStatus::Cancelled),
    ];
    const TERMINAL: &'static [Self] = &[PlanStatus::Progressed, PlanStatus::Cancelled];
}

/// The input lot binding captured at creation for task-bearing plans.
///
/// `quantity` is in the input stock's packaging units (grams for a roll).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanInput {
    pub stock_id: StockId,
    pub quantity: i64,
}

/// A unit of work binding one consumed input event to a task tree and to
/// produced output event(s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    id: PlanId,
    company_id: CompanyId,
    kind: PlanKind,
    status: PlanStatus,
    input: Option<PlanInput>,
    /// The single designated consuming event, recorded at start.
    assign_event_id: Option<StockEventId>,
    /// The single direct produced event (creation plans only).
    target_event_id: Option<StockEventId>,
}

impl Plan {
    pub fn new(
        id: PlanId,
        company_id: CompanyId,
        kind: PlanKind,
        input: Option<PlanInput>,
    ) -> DomainResult<Self> {
        match (&kind, &input) {
            (k, None) if k.has_tasks() => {
                return Err(DomainError::validation(
                    "a task-bearing plan requires an input lot",
                ));
            }
            (PlanKind::Creation, Some(_)) => {
                return Err(DomainError::validation(
                    "a creation plan consumes no input lot",
                ));
            }
            _ => {}
        }
        if let Some(input) = &input {
            if input.quantity <= 0 {
                return Err(DomainError::validation("input quantity must be positive"));
            }
        }
        Ok(Self {
            id,
            company_id,
            kind,
            status: PlanStatus::Preparing,
            input,
            assign_event_id: None,
            target_event_id: None,
        })
    }

    pub fn id_typed(&self) -> PlanId {
        self.id
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn kind(&self) -> PlanKind {
        self.kind
    }

    pub fn status(&self) -> PlanStatus {
        self.status
    }

    pub fn input(&self) -> Option<PlanInput> {
        self.input
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.kind.order_id()
    }

    pub fn assign_event_id(&self) -> Option<StockEventId> {
        self.assign_event_id
    }

    pub fn target_event_id(&self) -> Option<StockEventId> {
        self.target_event_id
    }

    /// PREPARING → PROGRESSING.
    pub fn start(&mut self) -> DomainResult<()> {
        self.status = self.status.apply(PlanAction::Start)?;
        Ok(())
    }

    /// PROGRESSING → PROGRESSED. Confirms no stock events; confirmation
    /// happens per task.
    pub fn complete(&mut self) -> DomainResult<()> {
        self.status = self.status.apply(PlanAction::Complete)?;
        Ok(())
    }

    /// PREPARING → CANCELLED. Started plans have ledger rows behind them and
    /// cannot be cancelled wholesale.
    pub fn cancel(&mut self) -> DomainResult<()> {
        self.status = self.status.apply(PlanAction::Cancel)?;
        Ok(())
    }

    /// Bind the plan's single designated assign (consuming) event.
    pub fn bind_assign_event(&mut self, event_id: StockEventId) -> DomainResult<()> {
        if self.assign_event_id.is_some() {
            return Err(DomainError::conflict("plan already has an assign event"));
        }
        self.assign_event_id = Some(event_id);
        Ok(())
    }

    /// Bind the plan's single direct target (produced) event.
    pub fn bind_target_event(&mut self, event_id: StockEventId) -> DomainResult<()> {
        if !matches!(self.kind, PlanKind::Creation) {
            return Err(DomainError::validation(
                "only creation plans carry a direct target event",
            ));
        }
        if self.target_event_id.is_some() {
            return Err(DomainError::conflict("plan already has a target event"));
        }
        self.target_event_id = Some(event_id);
        Ok(())
    }
}

impl Entity for Plan {
    type Id = PlanId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
