// src/review/gate.rs

//! Registry of open review requests and the decision entry point.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::config::StepDefinition;
use crate::engine::{ExecutionId, StepId};
use crate::errors::{FlowgateError, Result};
use crate::review::request::{ReviewId, ReviewRequest, ReviewSubmission};

/// Raised for a pending review past its deadline. Monitoring only: the gate
/// never resolves a request on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewTimeoutWarning {
    pub request_id: ReviewId,
    pub execution_id: ExecutionId,
    pub step_id: StepId,
    pub reviewer: String,
    pub deadline: DateTime<Utc>,
    pub overdue_by: chrono::Duration,
}

struct PendingReview {
    request: ReviewRequest,
    responder: oneshot::Sender<ReviewRequest>,
}

/// Holds pending review requests until a decision arrives.
///
/// Each pending request carries a oneshot sender that wakes the suspended
/// review step with the resolved request.
#[derive(Default)]
pub struct ReviewGate {
    pending: DashMap<ReviewId, PendingReview>,
    resolved: DashMap<ReviewId, ReviewRequest>,
}

impl ReviewGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a request for a review step. The receiver resolves with the
    /// request once a decision is submitted.
    pub fn open(
        &self,
        execution_id: ExecutionId,
        step: &StepDefinition,
        now: DateTime<Utc>,
    ) -> (ReviewRequest, oneshot::Receiver<ReviewRequest>) {
        let (reviewer, deadline_secs) = match &step.review {
            Some(settings) => (settings.reviewer.clone(), settings.deadline_secs),
            None => {
                warn!(step = %step.id, "review step without review settings; leaving reviewer unassigned");
                (String::new(), 0)
            }
        };
        let deadline_secs = i64::try_from(deadline_secs).unwrap_or(i64::MAX);
        let deadline = now
            .checked_add_signed(chrono::Duration::seconds(deadline_secs))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let request = ReviewRequest::new(execution_id, step.id.clone(), reviewer, deadline, now);
        let (tx, rx) = oneshot::channel();

        info!(
            review_id = %request.id,
            execution_id = %execution_id,
            step = %step.id,
            reviewer = %request.reviewer,
            %deadline,
            "review request opened"
        );

        self.pending.insert(
            request.id,
            PendingReview {
                request: request.clone(),
                responder: tx,
            },
        );

        (request, rx)
    }

    /// Resolve a pending request and wake the gated step.
    pub fn submit_decision(
        &self,
        review_id: ReviewId,
        submission: ReviewSubmission,
        now: DateTime<Utc>,
    ) -> Result<ReviewRequest> {
        let Some((_, mut pending)) = self.pending.remove(&review_id) else {
            if self.resolved.contains_key(&review_id) {
                return Err(FlowgateError::ReviewAlreadyResolved(review_id));
            }
            return Err(FlowgateError::ReviewNotFound(review_id));
        };

        if pending.request.reviewer != submission.reviewer {
            warn!(
                review_id = %review_id,
                assigned = %pending.request.reviewer,
                submitted_by = %submission.reviewer,
                "review decision submitted by a different identity than assigned"
            );
        }

        pending.request.resolve(&submission, now)?;
        let request = pending.request;

        info!(
            review_id = %review_id,
            step = %request.step_id,
            status = %request.status,
            decided_by = %submission.reviewer,
            "review request resolved"
        );

        self.resolved.insert(review_id, request.clone());

        if pending.responder.send(request.clone()).is_err() {
            warn!(
                review_id = %review_id,
                "gated step is no longer waiting for this review"
            );
        }

        Ok(request)
    }

    /// Look up a request, pending or resolved.
    pub fn get(&self, review_id: ReviewId) -> Option<ReviewRequest> {
        if let Some(p) = self.pending.get(&review_id) {
            return Some(p.request.clone());
        }
        self.resolved.get(&review_id).map(|r| r.value().clone())
    }

    pub fn pending_requests(&self) -> Vec<ReviewRequest> {
        let mut requests: Vec<ReviewRequest> =
            self.pending.iter().map(|p| p.request.clone()).collect();
        requests.sort_by_key(|r| r.created_at);
        requests
    }

    pub fn pending_for_execution(&self, execution_id: ExecutionId) -> Vec<ReviewRequest> {
        self.pending_requests()
            .into_iter()
            .filter(|r| r.execution_id == execution_id)
            .collect()
    }

    /// Drop every request, pending or resolved, that belongs to
    /// `execution_id`. Returns how many were removed.
    pub fn forget_execution(&self, execution_id: ExecutionId) -> usize {
        let before = self.pending.len() + self.resolved.len();
        self.pending
            .retain(|_, p| p.request.execution_id != execution_id);
        self.resolved.retain(|_, r| r.execution_id != execution_id);
        before.saturating_sub(self.pending.len() + self.resolved.len())
    }

    /// Pending requests past their deadline.
    pub fn overdue(&self, now: DateTime<Utc>) -> Vec<ReviewTimeoutWarning> {
        let warnings: Vec<ReviewTimeoutWarning> = self
            .pending_requests()
            .into_iter()
            .filter(|r| r.is_overdue(now))
            .map(|r| ReviewTimeoutWarning {
                request_id: r.id,
                execution_id: r.execution_id,
                step_id: r.step_id,
                reviewer: r.reviewer,
                deadline: r.deadline,
                overdue_by: now - r.deadline,
            })
            .collect();

        for w in warnings.iter() {
            warn!(
                review_id = %w.request_id,
                step = %w.step_id,
                reviewer = %w.reviewer,
                overdue_secs = w.overdue_by.num_seconds(),
                "review request is overdue"
            );
        }

        warnings
    }
}
