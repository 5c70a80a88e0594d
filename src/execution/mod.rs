// src/execution/mod.rs

//! Execution records and per-step runtime state.
//!
//! - [`step_state`] is the per-step lifecycle and its transition table.
//! - [`record`] is the execution record with its append-only event log.
//! - [`status`] is the read-only progress projection served to callers.

pub mod record;
pub mod status;
pub mod step_state;

pub use record::{Execution, ExecutionStatus, ExecutionTrigger, LogEntry, LogKind};
pub use status::ExecutionStatusReport;
pub use step_state::{StepRuntimeState, StepStatus, StepTransition};
