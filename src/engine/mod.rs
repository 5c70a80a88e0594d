// src/engine/mod.rs

//! Orchestration engine for flowgate.
//!
//! This module ties together:
//! - the dependency scheduler
//! - the step executor (retries and review suspension)
//! - one drive loop per execution that reacts to step events
//! - the drift monitor and the retraining guard
//!
//! The pure per-execution state machine lives in [`core`]; the async/IO shell
//! that fans out frontiers and talks to persistence is [`runtime`]. The
//! public facade is [`Engine`] in [`orchestrator`].

use uuid::Uuid;

/// Canonical step identifier type used throughout the engine.
pub type StepId = String;

/// Identifier of one execution (UUID v7, so ids sort by creation time).
pub type ExecutionId = Uuid;

pub mod core;
pub mod orchestrator;
pub mod runtime;

pub use core::ExecutionCore;
pub use orchestrator::{Engine, EngineBuilder, EngineOptions};
pub use runtime::ExecutionRuntime;
