// src/drift/mod.rs

//! Model drift detection and the retraining trigger.
//!
//! - [`signal`] is the drift signal, its severity grading and status lifecycle.
//! - [`scorer`] holds the scoring functions (population stability index).
//! - [`source`] is where feature windows come from.
//! - [`monitor`] scores configured models and keeps signal history.
//! - [`guard`] enforces one active retraining execution per model.
//! - [`watch`] runs detection on an interval.

pub mod guard;
pub mod monitor;
pub mod scorer;
pub mod signal;
pub mod source;
pub mod watch;

use serde::Serialize;

pub use guard::{DuplicateRetrainingSuppressed, RetrainingDecision, RetrainingGuard};
pub use monitor::DriftMonitor;
pub use scorer::{DriftScorer, PopulationStabilityIndex, non_finite_rate};
pub use signal::{DriftKind, DriftSignal, DriftSignalStatus, Severity, SignalId};
pub use source::{FeatureSource, FeatureWindow};
pub use watch::spawn_drift_watch;

/// Result of one detection pass for a model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftReport {
    pub model_id: String,
    pub signals: Vec<DriftSignal>,
    /// Set when a critical signal led to a retraining attempt.
    pub retraining: Option<RetrainingDecision>,
}
