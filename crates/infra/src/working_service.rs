//! Plan/task orchestration: the process and trade working workflows.
//!
//! Each operation is one store transaction. Plan row locks are taken first;
//! stock row locks nest inside them, so availability checks, ledger writes,
//! and aggregate recomputes commit or reject together with the status flip
//! that gates them.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use papermill_core::{
    CompanyId, DomainError, DomainResult, InvoiceId, OrderId, PlanId, StateMachine, StockEventId,
    StockId, TaskId,
};
use papermill_shipping::{Invoice, InvoiceSink};
use papermill_stock::{PlanLink, PlanLinkRole, Stock, StockEvent, StockEventStatus};
use papermill_working::{
    ChainOutput, Plan, PlanInput, PlanKind, PlanStatus, Task, TaskAction, TaskKind, TaskStatus,
    evaluate_chain,
};

use crate::store::{InMemoryStore, PlanOutput, PlanRow};

/// Working workflow entry points (`start_plan`, `finish_task`, ...).
pub struct WorkingService<S: InvoiceSink> {
    store: Arc<InMemoryStore>,
    invoices: S,
}

impl<S: InvoiceSink> WorkingService<S> {
    pub fn new(store: Arc<InMemoryStore>, invoices: S) -> Self {
        Self { store, invoices }
    }

    /// Create a process plan over an owned input lot.
    pub fn create_process_plan(
        &self,
        company_id: CompanyId,
        input: PlanInput,
    ) -> DomainResult<PlanId> {
        self.create_task_bearing_plan(company_id, PlanKind::Process, input)
    }

    /// Create the 1:1 trade plan of an accepted order. The attachment is
    /// made inside the order row lock, so the order's status is re-read in
    /// the same transaction that binds the plan.
    pub fn create_trade_plan(
        &self,
        order_id: OrderId,
        company_id: CompanyId,
        input: PlanInput,
    ) -> DomainResult<PlanId> {
        let stock = self.store.read_stock(input.stock_id)?;
        if stock.company_id() != company_id {
            return Err(DomainError::validation("input lot belongs to another company"));
        }
        let plan = Plan::new(
            PlanId::new(),
            company_id,
            PlanKind::Trade { order_id },
            Some(input),
        )?;
        let plan_id = plan.id_typed();
        self.store.with_order(order_id, |order| order.attach_plan(plan_id))?;
        self.store.insert_plan(plan)?;
        info!(%plan_id, %order_id, "trade plan created and attached");
        Ok(plan_id)
    }

    fn create_task_bearing_plan(
        &self,
        company_id: CompanyId,
        kind: PlanKind,
        input: PlanInput,
    ) -> DomainResult<PlanId> {
        let stock = self.store.read_stock(input.stock_id)?;
        if stock.company_id() != company_id {
            return Err(DomainError::validation("input lot belongs to another company"));
        }
        let plan = Plan::new(PlanId::new(), company_id, kind, Some(input))?;
        let plan_id = plan.id_typed();
        self.store.insert_plan(plan)?;
        info!(%plan_id, "plan created");
        Ok(plan_id)
    }

    /// Create a creation plan: the lot it registers enters the ledger as the
    /// plan's direct target event, PENDING until arrival is accepted.
    pub fn create_creation_plan(
        &self,
        company_id: CompanyId,
        spec: papermill_stock::StockSpec,
        quantity: i64,
        price: u64,
    ) -> DomainResult<(PlanId, StockId)> {
        if quantity <= 0 {
            return Err(DomainError::validation("created quantity must be positive"));
        }
        let mut plan = Plan::new(PlanId::new(), company_id, PlanKind::Creation, None)?;
        let plan_id = plan.id_typed();
        let stock = Stock::receive(StockId::new(), company_id, spec, price)?;
        let stock_id = stock.id_typed();
        let event = StockEvent::record(
            StockEventId::new(),
            stock_id,
            quantity,
            StockEventStatus::Pending,
            Some(PlanLink {
                plan_id,
                task_id: None,
                role: PlanLinkRole::Target,
            }),
            Utc::now(),
        )?;
        let event_id = event.id_typed();
        plan.bind_target_event(event_id)?;

        self.store.insert_stock(stock)?;
        self.store.with_stock(stock_id, |row| {
            row.append(event);
            Ok(())
        })?;
        self.store.index_event(event_id, stock_id)?;
        self.store.insert_plan(plan)?;

        info!(%plan_id, %stock_id, quantity, "creation plan registered");
        Ok((plan_id, stock_id))
    }

    /// Grow the task tree. Legal only while the plan is PREPARING.
    pub fn add_task(
        &self,
        plan_id: PlanId,
        parent: Option<TaskId>,
        kind: TaskKind,
    ) -> DomainResult<TaskId> {
        let task_id = TaskId::new();
        self.store.with_plan(plan_id, |row| {
            if !row.plan.kind().has_tasks() {
                return Err(DomainError::validation("creation plans carry no task tree"));
            }
            if row.plan.status() != PlanStatus::Preparing {
                return Err(DomainError::invalid_transition(
                    "plan",
                    format!("{:?}", row.plan.status()),
                    "AddTask",
                ));
            }
            let task = Task::new(task_id, plan_id, parent, kind)?;
            row.tasks.insert(task)
        })?;
        self.store.index_task(task_id, plan_id)?;
        debug!(%plan_id, %task_id, "task added");
        Ok(task_id)
    }

    /// Start a plan. For task-bearing plans this validates the tree,
    /// reserves the input lot (PENDING consumption, availability pre-checked
    /// under the row lock), evaluates the engine for every reachable RELEASE
    /// leaf, and materializes one provisional output lot per leaf. Creation
    /// plans just flip status; their target event already exists.
    pub fn start_plan(&self, plan_id: PlanId) -> DomainResult<()> {
        self.store
            .with_plan(plan_id, |row| self.start_plan_tx(plan_id, row))?;
        info!(%plan_id, "plan started");
        Ok(())
    }

    fn start_plan_tx(&self, plan_id: PlanId, row: &mut PlanRow) -> DomainResult<()> {
        if row.plan.status() != PlanStatus::Preparing {
            return Err(DomainError::invalid_transition(
                "plan",
                format!("{:?}", row.plan.status()),
                "Start",
            ));
        }
        if !row.plan.kind().has_tasks() {
            return row.plan.start();
        }

        if row.tasks.is_empty() {
            return Err(DomainError::structural("a process plan needs at least one task"));
        }
        row.tasks.validate()?;

        let input = row
            .plan
            .input()
            .ok_or_else(|| DomainError::structural("task-bearing plan without an input lot"))?;
        let root_stock = self.store.read_stock(input.stock_id)?;
        let root_spec = root_stock.spec().clone();

        // Evaluate every reachable leaf first; a malformed branch or an
        // empty-handed one rejects the start before anything is written.
        let mut evaluated: Vec<(TaskId, ChainOutput)> = Vec::new();
        for leaf in row.tasks.release_leaves() {
            let chain = row.tasks.chain_to_root(leaf.id_typed())?;
            let output = evaluate_chain(&root_spec, input.quantity, &chain)?;
            if output.quantity <= 0 {
                return Err(DomainError::validation(
                    "a release leaf would produce no output",
                ));
            }
            evaluated.push((leaf.id_typed(), output));
        }

        let mut staged: Vec<(TaskId, Stock, i64)> = Vec::new();
        for (task_id, output) in evaluated {
            // Cost attribution of produced lots is the accounting
            // subsystem's concern.
            let stock = Stock::receive(
                StockId::new(),
                row.plan.company_id(),
                output.to_spec(&root_spec),
                0,
            )?;
            staged.push((task_id, stock, output.quantity));
        }

        // Reserve the input lot: availability check + PENDING consumption in
        // one stock row scope.
        let assign_event_id = StockEventId::new();
        self.store.with_stock(input.stock_id, |stock_row| {
            let available = stock_row.stock.quantity_available();
            if input.quantity > available {
                return Err(DomainError::insufficient_quantity(input.quantity, available));
            }
            let event = StockEvent::record(
                assign_event_id,
                input.stock_id,
                -input.quantity,
                StockEventStatus::Pending,
                Some(PlanLink {
                    plan_id,
                    task_id: None,
                    role: PlanLinkRole::Assign,
                }),
                Utc::now(),
            )?;
            stock_row.append(event);
            Ok(())
        })?;
        self.store.index_event(assign_event_id, input.stock_id)?;
        row.plan.bind_assign_event(assign_event_id)?;

        for (task_id, stock, quantity) in staged {
            let stock_id = stock.id_typed();
            let event = StockEvent::record(
                StockEventId::new(),
                stock_id,
                quantity,
                StockEventStatus::Pending,
                Some(PlanLink {
                    plan_id,
                    task_id: Some(task_id),
                    role: PlanLinkRole::Target,
                }),
                Utc::now(),
            )?;
            let event_id = event.id_typed();
            self.store.insert_stock(stock)?;
            self.store.with_stock(stock_id, |r| {
                r.append(event);
                Ok(())
            })?;
            self.store.index_event(event_id, stock_id)?;
            row.outputs.insert(task_id, PlanOutput { stock_id, event_id });
            debug!(%plan_id, %task_id, %stock_id, quantity, "provisional output materialized");
        }

        row.plan.start()
    }

    /// PROGRESSING → PROGRESSED. Confirms no stock events; confirmation
    /// happens per task.
    pub fn complete_plan(&self, plan_id: PlanId) -> DomainResult<()> {
        self.store.with_plan(plan_id, |row| row.plan.complete())?;
        info!(%plan_id, "plan completed");
        Ok(())
    }

    /// PREPARING → CANCELLED. A started plan has ledger rows behind it and
    /// must be unwound per event instead.
    pub fn cancel_plan(&self, plan_id: PlanId) -> DomainResult<()> {
        self.store.with_plan(plan_id, |row| row.plan.cancel())?;
        info!(%plan_id, "plan cancelled");
        Ok(())
    }

    /// Begin work on a task. Legal only while the owning plan progresses.
    pub fn start_task(&self, task_id: TaskId) -> DomainResult<()> {
        let plan_id = self.store.plan_of_task(task_id)?;
        self.store.with_plan(plan_id, |row| {
            if row.plan.status() != PlanStatus::Progressing {
                return Err(DomainError::invalid_transition(
                    "plan",
                    format!("{:?}", row.plan.status()),
                    "StartTask",
                ));
            }
            row.tasks.get_mut(task_id)?.start()
        })?;
        debug!(%plan_id, %task_id, "task started");
        Ok(())
    }

    /// Finish a task. Parent-before-child ordering is mandatory: a task with
    /// a parent can finish only once that parent is PROGRESSED. RELEASE
    /// tasks re-evaluate their branch, settle the provisional output, and,
    /// for order-linked plans, emit the shipping invoice.
    pub fn finish_task(&self, task_id: TaskId) -> DomainResult<()> {
        let plan_id = self.store.plan_of_task(task_id)?;
        let mut shipped: Option<Invoice> = None;

        self.store.with_plan(plan_id, |row| {
            let task = row.tasks.get(task_id)?;
            if let Some(parent_id) = task.parent() {
                let parent = row.tasks.get(parent_id)?;
                if parent.status() != TaskStatus::Progressed {
                    return Err(DomainError::invalid_transition(
                        "task",
                        format!("parent {:?}", parent.status()),
                        "Finish",
                    ));
                }
            }
            if !task.status().allows(TaskAction::Finish) {
                return Err(DomainError::invalid_transition(
                    "task",
                    format!("{:?}", task.status()),
                    "Finish",
                ));
            }

            if task.kind().is_release() {
                let input = row.plan.input().ok_or_else(|| {
                    DomainError::structural("task-bearing plan without an input lot")
                })?;
                let root_stock = self.store.read_stock(input.stock_id)?;
                let chain = row.tasks.chain_to_root(task_id)?;
                let final_output = evaluate_chain(root_stock.spec(), input.quantity, &chain)?;

                let output = row.outputs.get(&task_id).copied().ok_or_else(|| {
                    DomainError::structural("release task has no provisional output")
                })?;
                self.settle_output(plan_id, task_id, output, final_output.quantity)?;

                if let Some(order_id) = row.plan.order_id() {
                    shipped = Some(Invoice {
                        id: InvoiceId::new(),
                        company_id: row.plan.company_id(),
                        order_id,
                        plan_id,
                        task_id,
                        packaging: final_output.packaging,
                        size_x: final_output.size_x,
                        size_y: final_output.size_y,
                        quantity: final_output.quantity,
                        issued_at: Utc::now(),
                    });
                }
            }

            row.tasks.get_mut(task_id)?.finish()
        })?;

        if let Some(invoice) = shipped {
            info!(invoice_id = %invoice.id, %plan_id, %task_id, "shipping invoice emitted");
            self.invoices.submit(invoice)?;
        }
        info!(%plan_id, %task_id, "task finished");
        Ok(())
    }

    /// Confirm the provisional target row when the final quantity matches;
    /// otherwise cancel it and append a NORMAL row at the final quantity.
    /// Rows are immutable, so the correction is a new row, never an update.
    fn settle_output(
        &self,
        plan_id: PlanId,
        task_id: TaskId,
        output: PlanOutput,
        final_quantity: i64,
    ) -> DomainResult<()> {
        let appended = self.store.with_stock(output.stock_id, |row| {
            let provisional_delta = {
                let provisional = row.event_mut(output.event_id)?;
                if provisional.delta() == final_quantity {
                    provisional.confirm()?;
                    row.recompute();
                    return Ok(None);
                }
                provisional.cancel()?;
                provisional.delta()
            };
            debug!(
                provisional = provisional_delta,
                final_quantity,
                "provisional output superseded"
            );
            if final_quantity > 0 {
                let event = StockEvent::record(
                    StockEventId::new(),
                    output.stock_id,
                    final_quantity,
                    StockEventStatus::Normal,
                    Some(PlanLink {
                        plan_id,
                        task_id: Some(task_id),
                        role: PlanLinkRole::Target,
                    }),
                    Utc::now(),
                )?;
                let event_id = event.id_typed();
                row.append(event);
                return Ok(Some(event_id));
            }
            row.recompute();
            Ok(None)
        })?;
        if let Some(event_id) = appended {
            self.store.index_event(event_id, output.stock_id)?;
        }
        Ok(())
    }

    /// Record real (non-provisional) consumption against the plan. Legal
    /// only while the plan progresses; the availability check and the NORMAL
    /// consuming row share one stock row scope.
    pub fn register_input_stock(
        &self,
        plan_id: PlanId,
        stock_id: StockId,
        quantity: i64,
    ) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::validation("consumed quantity must be positive"));
        }
        self.store.with_plan(plan_id, |row| {
            if row.plan.status() != PlanStatus::Progressing {
                return Err(DomainError::invalid_transition(
                    "plan",
                    format!("{:?}", row.plan.status()),
                    "RegisterInputStock",
                ));
            }
            let event_id = StockEventId::new();
            self.store.with_stock(stock_id, |stock_row| {
                let available = stock_row.stock.quantity_available();
                if quantity > available {
                    return Err(DomainError::insufficient_quantity(quantity, available));
                }
                let event = StockEvent::record(
                    event_id,
                    stock_id,
                    -quantity,
                    StockEventStatus::Normal,
                    Some(PlanLink {
                        plan_id,
                        task_id: None,
                        role: PlanLinkRole::Assign,
                    }),
                    Utc::now(),
                )?;
                stock_row.append(event);
                Ok(())
            })?;
            self.store.index_event(event_id, stock_id)
        })?;
        info!(%plan_id, %stock_id, quantity, "input stock registered");
        Ok(())
    }

    /// PROGRESSING → PREPARING, tasks only. A finished child pins its
    /// ancestors: resetting would break parent-before-child ordering.
    pub fn reset_task(&self, task_id: TaskId) -> DomainResult<()> {
        let plan_id = self.store.plan_of_task(task_id)?;
        self.store.with_plan(plan_id, |row| {
            let finished_child = row
                .tasks
                .children_of(task_id)
                .any(|c| c.status() == TaskStatus::Progressed);
            if finished_child {
                return Err(DomainError::conflict(
                    "cannot reset a task whose children have finished",
                ));
            }
            row.tasks.get_mut(task_id)?.reset()
        })?;
        debug!(%plan_id, %task_id, "task reset");
        Ok(())
    }

    /// Remove a step from the pending tree. Legal only while the plan is
    /// PREPARING (started plans have provisional output behind their tree)
    /// and only for tasks with no live children.
    pub fn cancel_task(&self, task_id: TaskId) -> DomainResult<()> {
        let plan_id = self.store.plan_of_task(task_id)?;
        self.store.with_plan(plan_id, |row| {
            if row.plan.status() != PlanStatus::Preparing {
                return Err(DomainError::invalid_transition(
                    "plan",
                    format!("{:?}", row.plan.status()),
                    "CancelTask",
                ));
            }
            let live_child = row
                .tasks
                .children_of(task_id)
                .any(|c| c.status() != TaskStatus::Cancelled);
            if live_child {
                return Err(DomainError::conflict(
                    "cannot cancel a task with live children",
                ));
            }
            row.tasks.get_mut(task_id)?.cancel()
        })?;
        debug!(%plan_id, %task_id, "task cancelled");
        Ok(())
    }

    /// Read one plan's current state (tests and read side).
    pub fn plan(&self, plan_id: PlanId) -> DomainResult<Plan> {
        self.store.read_plan(plan_id)
    }

    /// Where a release task's provisional output landed.
    pub fn output_of_task(&self, task_id: TaskId) -> DomainResult<PlanOutput> {
        let plan_id = self.store.plan_of_task(task_id)?;
        self.store.with_plan(plan_id, |row| {
            row.outputs.get(&task_id).copied().ok_or(DomainError::NotFound)
        })
    }
}
