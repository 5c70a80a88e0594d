#![allow(dead_code)]

pub use flowgate_test_utils::builders::{StepBuilder, WorkflowBuilder};
pub use flowgate_test_utils::fake_steps::{Script, ScriptedSteps, StepJournal};
pub use flowgate_test_utils::{init_tracing, wait_until, with_timeout};

use std::sync::Arc;

use flowgate::config::WorkflowDefinition;
use flowgate::engine::Engine;
use flowgate::persistence::InMemoryPersistence;

/// Engine wired to scripted bodies and an in-memory store.
pub fn scripted_engine(steps: ScriptedSteps) -> (Engine, Arc<InMemoryPersistence>) {
    let persistence = Arc::new(InMemoryPersistence::new());
    let engine = Engine::builder()
        .registry(steps.into_registry())
        .persistence(persistence.clone())
        .build();
    (engine, persistence)
}

pub fn arc(def: WorkflowDefinition) -> Arc<WorkflowDefinition> {
    Arc::new(def)
}
