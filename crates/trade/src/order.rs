//! The counter-party order and its lifecycle.

use serde::{Deserialize, Serialize};

use papermill_core::{
    CompanyId, DomainError, DomainResult, Entity, OrderId, PlanId, StateMachine,
};
use papermill_stock::StockSpec;

/// Which counterparty initiated the transaction.
///
/// Fixed at creation. Affects vocabulary only (an "offer" is supplier-
/// initiated, an "order" buyer-initiated); transition legality is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderOrigin {
    Offer,
    Order,
}

impl OrderOrigin {
    fn prefix(self) -> &'static str {
        match self {
            OrderOrigin::Offer => "OFFER",
            OrderOrigin::Order => "ORDER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Preparing,
    Requested,
    Accepted,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderAction {
    Request,
    Accept,
    Reject,
    Reset,
    Cancel,
}

impl StateMachine for OrderStatus {
    type Action = OrderAction;

    const ENTITY: &'static str = "order";
    const TABLE: &'static [(Self, OrderAction, Self)] = &[
        (OrderStatus::Preparing, OrderAction::Request, OrderStatus::Requested),
        (OrderStatus::Requested, OrderAction::Accept, OrderStatus::Accepted),
        (OrderStatus::Requested, OrderAction::Reject, OrderStatus::Rejected),
        (OrderStatus::Requested, OrderAction::Reset, OrderStatus::Preparing),
        (OrderStatus::Preparing, OrderAction::Cancel, OrderStatus::Cancelled),
    ];
    const TERMINAL: &'static [Self] = &[
        OrderStatus::Accepted,
        OrderStatus::Rejected,
        OrderStatus::Cancelled,
    ];
}

/// The stock the order asks for, in the requested spec's packaging units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedStock {
    pub spec: StockSpec,
    pub quantity: i64,
}

/// A counter-party transaction. A plan may attach 1:1 once the order is
/// accepted; the ordered stock then supplies the plan's assign target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    origin: OrderOrigin,
    /// The company that initiated the transaction.
    src_company_id: CompanyId,
    /// The counterparty.
    dst_company_id: CompanyId,
    status: OrderStatus,
    requested: OrderedStock,
    plan_id: Option<PlanId>,
}

impl Order {
    pub fn new(
        id: OrderId,
        origin: OrderOrigin,
        src_company_id: CompanyId,
        dst_company_id: CompanyId,
        requested: OrderedStock,
    ) -> DomainResult<Self> {
        if src_company_id == dst_company_id {
            return Err(DomainError::validation("an order needs two distinct companies"));
        }
        requested.spec.validate()?;
        if requested.quantity <= 0 {
            return Err(DomainError::validation("ordered quantity must be positive"));
        }
        Ok(Self {
            id,
            origin,
            src_company_id,
            dst_company_id,
            status: OrderStatus::Preparing,
            requested,
            plan_id: None,
        })
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn origin(&self) -> OrderOrigin {
        self.origin
    }

    pub fn src_company_id(&self) -> CompanyId {
        self.src_company_id
    }

    pub fn dst_company_id(&self) -> CompanyId {
        self.dst_company_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn requested(&self) -> &OrderedStock {
        &self.requested
    }

    pub fn plan_id(&self) -> Option<PlanId> {
        self.plan_id
    }

    /// Status with the origin vocabulary prefix, e.g. `OFFER_REQUESTED`.
    pub fn status_label(&self) -> String {
        format!("{}_{:?}", self.origin.prefix(), self.status).to_uppercase()
    }

    pub fn request(&mut self) -> DomainResult<()> {
        self.status = self.status.apply(OrderAction::Request)?;
        Ok(())
    }

    pub fn accept(&mut self) -> DomainResult<()> {
        self.status = self.status.apply(OrderAction::Accept)?;
        Ok(())
    }

    pub fn reject(&mut self) -> DomainResult<()> {
        self.status = self.status.apply(OrderAction::Reject)?;
        Ok(())
    }

    /// REQUESTED → PREPARING, the enumerated reversal.
    pub fn reset(&mut self) -> DomainResult<()> {
        let to = self.status.apply(OrderAction::Reset)?;
        debug_assert!(self.status.can_become(to));
        self.status = to;
        Ok(())
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        self.status = self.status.apply(OrderAction::Cancel)?;
        Ok(())
    }

    /// Attach the 1:1 working plan. Legal only once the order is accepted.
    pub fn attach_plan(&mut self, plan_id: PlanId) -> DomainResult<()> {
        if self.status != OrderStatus::Accepted {
            return Err(DomainError::invalid_transition(
                OrderStatus::ENTITY,
                format!("{:?}", self.status),
                "AttachPlan",
            ));
        }
        if self.plan_id.is_some() {
            return Err(DomainError::conflict("order already has an attached plan"));
        }
        self.plan_id = Some(plan_id);
        Ok(())
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
