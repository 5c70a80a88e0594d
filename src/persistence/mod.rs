// src/persistence/mod.rs

//! Storage seam for definitions and execution records.
//!
//! The engine never assumes a backend: it loads definitions and writes
//! execution snapshots through [`Persistence`]. [`memory`] ships an in-process
//! implementation used by tests and the CLI.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::WorkflowDefinition;
use crate::engine::ExecutionId;
use crate::errors::Result;
use crate::execution::{Execution, StepRuntimeState};

pub mod memory;

pub use memory::InMemoryPersistence;

#[async_trait]
pub trait Persistence: Send + Sync {
    /// Load an activated definition by workflow id.
    async fn load_definition(&self, definition_id: &str) -> Result<Arc<WorkflowDefinition>>;

    /// Store a full snapshot of an execution, replacing any previous one.
    async fn save_execution(&self, execution: &Execution) -> Result<()>;

    /// Store the latest state of one step.
    async fn update_step_state(
        &self,
        execution_id: ExecutionId,
        step_id: &str,
        state: &StepRuntimeState,
    ) -> Result<()>;
}
