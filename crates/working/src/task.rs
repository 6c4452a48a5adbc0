//! One manufacturing step inside a plan.

use serde::{Deserialize, Serialize};

use papermill_core::{DomainError, DomainResult, Entity, PlanId, StateMachine, TaskId};

/// The step's operation, with its type-specific payload.
///
/// Dimensions are millimetres, matching the stock spec. Only RELEASE tasks
/// are leaves that materialize real output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Slit/re-reel a roll, or cut it into sheets when `size_y > 0`.
    Converting { size_x: u32, size_y: u32 },
    /// Cut sheets down to a smaller format.
    Guillotine { size_x: u32, size_y: u32 },
    /// Finalize output at a declared quantity.
    Release { quantity: i64 },
}

impl TaskKind {
    pub fn is_release(self) -> bool {
        matches!(self, TaskKind::Release { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Preparing,
    Progressing,
    Progressed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    Start,
    Finish,
    Reset,
    Cancel,
}

impl StateMachine for TaskStatus {
    type Action = TaskAction;

    const ENTITY: &'static str = "task";
    const TABLE: &'static [(Self, TaskAction, Self)] = &[
        (TaskStatus::Preparing, TaskAction::Start, TaskStatus::Progressing),
        (TaskStatus::Preparing, TaskAction::Finish, TaskStatus::Progressed),
        (
            TaskStatus::Progressing,
            TaskAction::Finish,
            TaskStatus::Progressed,
        ),
        // The one legal reversal in the working module; plans have no
        // counterpart.
        (TaskStatus::Progressing, TaskAction::Reset, TaskStatus::Preparing),
        (TaskStatus::Preparing, TaskAction::Cancel, TaskStatus::Cancelled),
    ];
    const TERMINAL: &'static [Self] = &[TaskStatus::Progressed, TaskStatus::Cancelled];
}

/// One manufacturing step. Tasks form a single-rooted tree per plan via
/// `parent`; the implicit root is the plan's assigned input spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    plan_id: PlanId,
    parent: Option<TaskId>,
    kind: TaskKind,
    status: TaskStatus,
}

impl Task {
    pub fn new(
        id: TaskId,
        plan_id: PlanId,
        parent: Option<TaskId>,
        kind: TaskKind,
    ) -> DomainResult<Self> {
        match kind {
            TaskKind::Converting { size_x, .. } => {
                if size_x == 0 {
                    return Err(DomainError::validation("converting target size_x must be positive"));
                }
            }
            TaskKind::Guillotine { size_x, size_y } => {
                if size_x == 0 || size_y == 0 {
                    return Err(DomainError::validation(
                        "guillotine target dimensions must be positive",
                    ));
                }
            }
            TaskKind::Release { quantity } => {
                if quantity <= 0 {
                    return Err(DomainError::validation("release quantity must be positive"));
                }
            }
        }
        Ok(Self {
            id,
            plan_id,
            parent,
            kind,
            status: TaskStatus::Preparing,
        })
    }

    pub fn id_typed(&self) -> TaskId {
        self.id
    }

    pub fn plan_id(&self) -> PlanId {
        self.plan_id
    }

    pub fn parent(&self) -> Option<TaskId> {
        self.parent
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn start(&mut self) -> DomainResult<()> {
        self.status = self.status.apply(TaskAction::Start)?;
        Ok(())
    }

    pub fn finish(&mut self) -> DomainResult<()> {
        self.status = self.status.apply(TaskAction::Finish)?;
        Ok(())
    }

    /// PROGRESSING → PREPARING, the enumerated reversal.
    pub fn reset(&mut self) -> DomainResult<()> {
        let to = self.status.apply(TaskAction::Reset)?;
        debug_assert!(self.status.can_become(to));
        self.status = to;
        Ok(())
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        self.status = self.status.apply(TaskAction::Cancel)?;
        Ok(())
    }
}

impl Entity for Task {
    type Id = TaskId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_task(kind: TaskKind) -> Task {
        Task::new(TaskId::new(), PlanId::new(), None, kind).unwrap()
    }

    #[test]
    fn invalid_payloads_are_rejected() {
        assert!(Task::new(
            TaskId::new(),
            PlanId::new(),
            None,
            TaskKind::Converting { size_x: 0, size_y: 0 },
        )
        .is_err());
        assert!(Task::new(
            TaskId::new(),
            PlanId::new(),
            None,
            TaskKind::Guillotine { size_x: 350, size_y: 0 },
        )
        .is_err());
        assert!(Task::new(
            TaskId::new(),
            PlanId::new(),
            None,
            TaskKind::Release { quantity: 0 },
        )
        .is_err());
    }

    #[test]
    fn finish_is_legal_from_preparing_and_progressing() {
        let mut direct = test_task(TaskKind::Release { quantity: 100 });
        direct.finish().unwrap();
        assert_eq!(direct.status(), TaskStatus::Progressed);

        let mut staged = test_task(TaskKind::Release { quantity: 100 });
        staged.start().unwrap();
        staged.finish().unwrap();
        assert_eq!(staged.status(), TaskStatus::Progressed);
    }

    #[test]
    fn reset_returns_a_progressing_task_to_preparing() {
        let mut task = test_task(TaskKind::Converting { size_x: 700, size_y: 1000 });
        task.start().unwrap();
        task.reset().unwrap();
        assert_eq!(task.status(), TaskStatus::Preparing);
    }

    #[test]
    fn reset_from_preparing_is_rejected() {
        let mut task = test_task(TaskKind::Converting { size_x: 700, size_y: 0 });
        let err = task.reset().unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[test]
    fn progressed_task_cannot_finish_again() {
        let mut task = test_task(TaskKind::Release { quantity: 100 });
        task.finish().unwrap();
        assert!(task.finish().is_err());
    }
}
