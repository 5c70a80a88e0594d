// src/review/request.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{ExecutionId, StepId};
use crate::errors::{FlowgateError, Result};
use crate::types::{Params, ReviewDecision};

pub type ReviewId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
    NeedsChanges,
}

impl ReviewStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ReviewStatus::Pending)
    }
}

impl From<ReviewDecision> for ReviewStatus {
    fn from(decision: ReviewDecision) -> Self {
        match decision {
            ReviewDecision::Approved => ReviewStatus::Approved,
            ReviewDecision::Rejected => ReviewStatus::Rejected,
            ReviewDecision::NeedsChanges => ReviewStatus::NeedsChanges,
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
            ReviewStatus::NeedsChanges => "needs_changes",
        };
        f.write_str(s)
    }
}

/// A decision handed in by a reviewer.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSubmission {
    pub decision: ReviewDecision,
    /// Identity of whoever submits the decision, kept for audit.
    pub reviewer: String,
    pub comments: Option<String>,
    /// Becomes the output of the gated step when approved.
    pub changes: Params,
}

impl ReviewSubmission {
    pub fn new(decision: ReviewDecision, reviewer: impl Into<String>) -> Self {
        Self {
            decision,
            reviewer: reviewer.into(),
            comments: None,
            changes: Params::new(),
        }
    }

    pub fn approve(reviewer: impl Into<String>) -> Self {
        Self::new(ReviewDecision::Approved, reviewer)
    }

    pub fn reject(reviewer: impl Into<String>) -> Self {
        Self::new(ReviewDecision::Rejected, reviewer)
    }

    pub fn needs_changes(reviewer: impl Into<String>) -> Self {
        Self::new(ReviewDecision::NeedsChanges, reviewer)
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    pub fn with_changes(mut self, changes: Params) -> Self {
        self.changes = changes;
        self
    }
}

/// Pause point created when a human-review step becomes ready.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewRequest {
    pub id: ReviewId,
    pub execution_id: ExecutionId,
    pub step_id: StepId,
    /// Reviewer assigned by the step's review settings.
    pub reviewer: String,
    pub status: ReviewStatus,
    pub comments: Option<String>,
    pub changes: Params,
    /// Identity that actually resolved the request.
    pub decided_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ReviewRequest {
    pub fn new(
        execution_id: ExecutionId,
        step_id: impl Into<StepId>,
        reviewer: impl Into<String>,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            execution_id,
            step_id: step_id.into(),
            reviewer: reviewer.into(),
            status: ReviewStatus::Pending,
            comments: None,
            changes: Params::new(),
            decided_by: None,
            created_at: now,
            deadline,
            resolved_at: None,
        }
    }

    /// Only a pending request can be resolved; it is final afterwards.
    pub fn resolve(&mut self, submission: &ReviewSubmission, now: DateTime<Utc>) -> Result<()> {
        let target = ReviewStatus::from(submission.decision);
        if self.status.is_terminal() {
            return Err(FlowgateError::IllegalTransition {
                entity: "review",
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }

        self.status = target;
        self.comments = submission.comments.clone();
        self.changes = submission.changes.clone();
        self.decided_by = Some(submission.reviewer.clone());
        self.resolved_at = Some(now);
        Ok(())
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == ReviewStatus::Pending && now > self.deadline
    }
}
