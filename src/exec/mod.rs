// src/exec/mod.rs

//! Step execution layer.
//!
//! - [`registry`] maps step types to their executable bodies.
//! - [`retry`] holds the backoff arithmetic of [`crate::config::RetryPolicy`].
//! - [`executor`] runs one dispatched step through its attempts (or through
//!   the review gate) and reports progress as [`StepEvent`]s.

pub mod executor;
pub mod registry;
pub mod retry;

pub use executor::{StepDispatch, StepEvent, StepExecutor, StepOutcome};
pub use registry::{FnStep, StepBody, StepInput, StepRegistry};
pub use retry::JITTER_RATIO;
