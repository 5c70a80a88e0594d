// src/drift/signal.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{FlowgateError, Result};

pub type SignalId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    Statistical,
    Concept,
    DataQuality,
}

/// Severity of a signal, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Grade `score` against `threshold` by their ratio `r`:
    /// `r <= 1` low, `r <= 1.2` medium, `r <= 1.5` high, otherwise critical.
    pub fn from_ratio(score: f64, threshold: f64) -> Self {
        let ratio = if threshold > 0.0 {
            score / threshold
        } else {
            f64::INFINITY
        };

        if ratio.is_nan() {
            // A NaN score means the scorer could not compare the windows.
            Severity::Critical
        } else if ratio <= 1.0 {
            Severity::Low
        } else if ratio <= 1.2 {
            Severity::Medium
        } else if ratio <= 1.5 {
            Severity::High
        } else {
            Severity::Critical
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftSignalStatus {
    Detected,
    Investigating,
    Resolved,
    Ignored,
}

impl DriftSignalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DriftSignalStatus::Resolved | DriftSignalStatus::Ignored)
    }

    fn can_move_to(self, to: DriftSignalStatus) -> bool {
        use DriftSignalStatus::*;
        matches!(
            (self, to),
            (Detected, Investigating)
                | (Detected, Resolved)
                | (Detected, Ignored)
                | (Investigating, Resolved)
                | (Investigating, Ignored)
        )
    }
}

impl fmt::Display for DriftSignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriftSignalStatus::Detected => "detected",
            DriftSignalStatus::Investigating => "investigating",
            DriftSignalStatus::Resolved => "resolved",
            DriftSignalStatus::Ignored => "ignored",
        };
        f.write_str(s)
    }
}

/// One detected divergence of a model feature from its baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftSignal {
    pub id: SignalId,
    pub model_id: String,
    pub feature: String,
    pub kind: DriftKind,
    pub score: f64,
    pub threshold: f64,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
    status: DriftSignalStatus,
}

impl DriftSignal {
    pub fn new(
        model_id: impl Into<String>,
        feature: impl Into<String>,
        kind: DriftKind,
        score: f64,
        threshold: f64,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            model_id: model_id.into(),
            feature: feature.into(),
            kind,
            score,
            threshold,
            severity: Severity::from_ratio(score, threshold),
            detected_at,
            status: DriftSignalStatus::Detected,
        }
    }

    pub fn status(&self) -> DriftSignalStatus {
        self.status
    }

    /// Human-driven status change.
    pub fn transition(&mut self, to: DriftSignalStatus) -> Result<()> {
        if !self.status.can_move_to(to) {
            return Err(FlowgateError::IllegalTransition {
                entity: "drift signal",
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}
