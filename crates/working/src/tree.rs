//! The task arena: one plan's tree, indexed by task id.
//!
//! The original parent-id self-reference is a cyclic-graph-adjacent
//! structure, so the chain resolver trusts nothing: cycles, dangling
//! parents, and cross-plan references are rejected at resolution time
//! instead of relying on referential integrity alone.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use papermill_core::{DomainError, DomainResult, TaskId};

use crate::task::{Task, TaskStatus};

/// Arena of one plan's tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskArena {
    tasks: HashMap<TaskId, Task>,
}

impl TaskArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task. Its parent (if any) must already be present, must not
    /// be the task itself, and must not be a RELEASE task (release tasks are
    /// leaves).
    pub fn insert(&mut self, task: Task) -> DomainResult<()> {
        if self.tasks.contains_key(&task.id_typed()) {
            return Err(DomainError::conflict("task already exists in the tree"));
        }
        if let Some(parent_id) = task.parent() {
            if parent_id == task.id_typed() {
                return Err(DomainError::structural("task cannot be its own parent"));
            }
            let parent = self
                .tasks
                .get(&parent_id)
                .ok_or_else(|| DomainError::structural("parent task is not in the tree"))?;
            if parent.plan_id() != task.plan_id() {
                return Err(DomainError::structural("parent task belongs to another plan"));
            }
            if parent.kind().is_release() {
                return Err(DomainError::structural("a release task cannot have children"));
            }
        }
        self.tasks.insert(task.id_typed(), task);
        Ok(())
    }

    pub fn get(&self, id: TaskId) -> DomainResult<&Task> {
        self.tasks.get(&id).ok_or(DomainError::NotFound)
    }

    pub fn get_mut(&mut self, id: TaskId) -> DomainResult<&mut Task> {
        self.tasks.get_mut(&id).ok_or(DomainError::NotFound)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn children_of(&self, id: TaskId) -> impl Iterator<Item = &Task> {
        self.tasks.values().filter(move |t| t.parent() == Some(id))
    }

    /// Non-cancelled RELEASE tasks currently reachable in the tree.
    pub fn release_leaves(&self) -> Vec<&Task> {
        let mut leaves: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| t.kind().is_release() && t.status() != TaskStatus::Cancelled)
            .collect();
        // Deterministic evaluation order for callers materializing output.
        leaves.sort_by_key(|t| *t.id_typed().as_uuid());
        leaves
    }

    /// Resolve the root-first ancestor chain of `leaf`.
    ///
    /// The chain terminates at a task with no parent (whose implicit parent
    /// is the plan's assigned input spec). Cycles and dangling parents are
    /// structural errors.
    pub fn chain_to_root(&self, leaf: TaskId) -> DomainResult<Vec<&Task>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(leaf);

        while let Some(id) = cursor {
            if !seen.insert(id) {
                return Err(DomainError::structural("task tree contains a cycle"));
            }
            let task = self
                .tasks
                .get(&id)
                .ok_or_else(|| DomainError::structural("parent chain leaves the tree"))?;
            chain.push(task);
            cursor = task.parent();
        }

        chain.reverse();
        Ok(chain)
    }

    /// Fail fast on a malformed tree: every non-cancelled leaf must be a
    /// RELEASE task and every ancestor chain must resolve.
    pub fn validate(&self) -> DomainResult<()> {
        for task in self.tasks.values() {
            if task.status() == TaskStatus::Cancelled {
                continue;
            }
            let has_children = self
                .children_of(task.id_typed())
                .any(|c| c.status() != TaskStatus::Cancelled);
            if !has_children && !task.kind().is_release() {
                return Err(DomainError::structural(
                    "every leaf of the task tree must be a release task",
                ));
            }
            self.chain_to_root(task.id_typed())?;
        }
        Ok(())
    }
}
