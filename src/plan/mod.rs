//! # Reconciliation Planning
//!
//! The task model and the diff engine that turns desired definitions plus
//! observed state into an ordered list of create/update/delete tasks.

pub mod planner;
pub mod task;

pub use planner::{Plan, Planner};
pub use task::{CompositeKey, ObjectKind, Task, TaskAction, TaskPayload, TaskStatus};
