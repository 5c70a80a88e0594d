use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Free-form parameter map used for step inputs and outputs.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Closed set of step kinds a workflow may contain.
///
/// Every kind except [`StepType::HumanReview`] is executed by a step body
/// registered in the [`StepRegistry`](crate::exec::StepRegistry). Review steps
/// are completed externally through the review gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Ingestion,
    Training,
    Prediction,
    #[serde(alias = "compliance")]
    Validation,
    Notification,
    HumanReview,
    Reporting,
}

impl StepType {
    pub const ALL: [StepType; 7] = [
        StepType::Ingestion,
        StepType::Training,
        StepType::Prediction,
        StepType::Validation,
        StepType::Notification,
        StepType::HumanReview,
        StepType::Reporting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Ingestion => "ingestion",
            StepType::Training => "training",
            StepType::Prediction => "prediction",
            StepType::Validation => "validation",
            StepType::Notification => "notification",
            StepType::HumanReview => "human_review",
            StepType::Reporting => "reporting",
        }
    }

    pub fn is_human_review(&self) -> bool {
        matches!(self, StepType::HumanReview)
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the delay between retry attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    Exponential,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential
    }
}

/// What caused an execution to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Schedule,
    Event,
    Manual,
    Drift,
}

/// Decision a reviewer can hand to a human-review step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
    NeedsChanges,
}

impl FromStr for ReviewDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "approve" | "approved" => Ok(ReviewDecision::Approved),
            "reject" | "rejected" => Ok(ReviewDecision::Rejected),
            "needs_changes" => Ok(ReviewDecision::NeedsChanges),
            other => Err(format!(
                "invalid review decision: {other} (expected \"approve\", \"reject\" or \"needs-changes\")"
            )),
        }
    }
}
