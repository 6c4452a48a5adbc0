//! Working domain module: plans, task trees, and the transformation engine.
//!
//! A plan binds one consumed input lot to a tree of manufacturing tasks
//! (resize / cut / release) and to the output lot(s) those tasks produce.
//! Everything here is deterministic domain logic; persistence and event
//! recording live in `papermill-infra`.

pub mod engine;
pub mod plan;
pub mod task;
pub mod tree;

pub use engine::{ChainOutput, evaluate_chain};
pub use plan::{Plan, PlanAction, PlanInput, PlanKind, PlanStatus};
pub use task::{Task, TaskAction, TaskKind, TaskStatus};
pub use tree::TaskArena;
