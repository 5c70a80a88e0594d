// src/dag/mod.rs

//! Step graph and dependency scheduling.
//!
//! - [`graph`] holds the step graph of one workflow definition.
//! - [`scheduler`] decides, from the current step states, what runs next.
//! - [`scheduler_step`] defines the result of a scheduler pass.
//! - [`state_manager`] answers read-only questions about per-run state.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;

pub use graph::DagGraph;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use state_manager::{StateView, UnreachableStep};
