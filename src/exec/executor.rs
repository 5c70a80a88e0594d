// src/exec/executor.rs

//! Runs one ready step to completion or permanent failure.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{RetryPolicy, StepDefinition};
use crate::engine::{ExecutionId, StepId};
use crate::errors::StepExecutionError;
use crate::exec::registry::{StepInput, StepRegistry};
use crate::review::{ReviewGate, ReviewNotifier, ReviewRequest, ReviewStatus};
use crate::types::Params;

/// Progress reported by the executor. The orchestrator turns each event into
/// step transitions and log lines on the execution record.
#[derive(Debug, Clone)]
pub enum StepEvent {
    Started {
        step_id: StepId,
        attempt: u32,
    },
    Completed {
        step_id: StepId,
        output: Params,
    },
    /// A failed attempt that will be retried after `retry_in`.
    AttemptFailed {
        step_id: StepId,
        attempt: u32,
        error: String,
        retry_in: Duration,
    },
    /// Permanent failure.
    Failed {
        step_id: StepId,
        attempts: u32,
        error: String,
    },
    ReviewRequested {
        step_id: StepId,
        request: ReviewRequest,
    },
    ReviewResolved {
        step_id: StepId,
        request: ReviewRequest,
    },
}

/// Final result of [`StepExecutor::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    Failed,
}

/// Everything needed to run one step outside the orchestrator.
#[derive(Debug, Clone)]
pub struct StepDispatch {
    pub execution_id: ExecutionId,
    pub step: StepDefinition,
    pub retry: RetryPolicy,
    pub execution_inputs: Params,
    pub upstream: BTreeMap<StepId, Params>,
}

/// Executes steps against the registry, applying the retry policy, or parks
/// review steps on the gate.
pub struct StepExecutor {
    registry: Arc<StepRegistry>,
    gate: Arc<ReviewGate>,
    notifier: Arc<dyn ReviewNotifier>,
}

impl StepExecutor {
    pub fn new(
        registry: Arc<StepRegistry>,
        gate: Arc<ReviewGate>,
        notifier: Arc<dyn ReviewNotifier>,
    ) -> Self {
        Self {
            registry,
            gate,
            notifier,
        }
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn gate(&self) -> &Arc<ReviewGate> {
        &self.gate
    }

    /// Run `dispatch` until it completes or fails for good.
    ///
    /// Never returns an error: failures end up in the events and the
    /// outcome.
    pub async fn execute(
        &self,
        dispatch: StepDispatch,
        events: mpsc::Sender<StepEvent>,
    ) -> StepOutcome {
        if dispatch.step.step_type.is_human_review() {
            self.execute_review(dispatch, &events).await
        } else {
            self.execute_body(dispatch, &events).await
        }
    }

    async fn execute_body(
        &self,
        dispatch: StepDispatch,
        events: &mpsc::Sender<StepEvent>,
    ) -> StepOutcome {
        let step_id = dispatch.step.id.clone();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            emit(
                events,
                StepEvent::Started {
                    step_id: step_id.clone(),
                    attempt,
                },
            )
            .await;

            match self.run_attempt(&dispatch, attempt).await {
                Ok(output) => {
                    info!(step = %step_id, attempt, "step completed");
                    emit(
                        events,
                        StepEvent::Completed {
                            step_id: step_id.clone(),
                            output,
                        },
                    )
                    .await;
                    return StepOutcome::Completed;
                }
                Err(err) => {
                    let retryable = !matches!(err, StepExecutionError::NoRuntime(_));

                    if retryable && dispatch.retry.should_retry(attempt) {
                        let retry_in = dispatch.retry.delay_for(attempt);
                        warn!(
                            step = %step_id,
                            attempt,
                            error = %err,
                            retry_in_ms = retry_in.as_millis() as u64,
                            "step attempt failed; retrying"
                        );
                        emit(
                            events,
                            StepEvent::AttemptFailed {
                                step_id: step_id.clone(),
                                attempt,
                                error: err.to_string(),
                                retry_in,
                            },
                        )
                        .await;
                        tokio::time::sleep(retry_in).await;
                        continue;
                    }

                    warn!(
                        step = %step_id,
                        attempts = attempt,
                        error = %err,
                        "step failed permanently"
                    );
                    emit(
                        events,
                        StepEvent::Failed {
                            step_id: step_id.clone(),
                            attempts: attempt,
                            error: err.to_string(),
                        },
                    )
                    .await;
                    return StepOutcome::Failed;
                }
            }
        }
    }

    /// One invocation of the step body, isolated on its own task so a panic
    /// becomes a step failure.
    async fn run_attempt(
        &self,
        dispatch: &StepDispatch,
        attempt: u32,
    ) -> Result<Params, StepExecutionError> {
        let step_type = dispatch.step.step_type;
        let body = self
            .registry
            .get(step_type)
            .ok_or(StepExecutionError::NoRuntime(step_type))?;

        let input = StepInput {
            execution_id: dispatch.execution_id,
            step_id: dispatch.step.id.clone(),
            step_type,
            attempt,
            params: dispatch.step.inputs.clone(),
            execution_inputs: dispatch.execution_inputs.clone(),
            upstream: dispatch.upstream.clone(),
        };

        debug!(step = %dispatch.step.id, %step_type, attempt, "invoking step body");

        match tokio::spawn(async move { body.run(input).await }).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(err)) => Err(StepExecutionError::Failed(format!("{err:#}"))),
            Err(join_err) => Err(StepExecutionError::Panicked(join_err.to_string())),
        }
    }

    /// Human-review variant: running until a decision arrives, never retried.
    async fn execute_review(
        &self,
        dispatch: StepDispatch,
        events: &mpsc::Sender<StepEvent>,
    ) -> StepOutcome {
        let step_id = dispatch.step.id.clone();

        emit(
            events,
            StepEvent::Started {
                step_id: step_id.clone(),
                attempt: 1,
            },
        )
        .await;

        let (request, decision) = self
            .gate
            .open(dispatch.execution_id, &dispatch.step, Utc::now());

        if let Err(err) = self
            .notifier
            .notify_reviewer(&request.reviewer, &request)
            .await
        {
            warn!(
                step = %step_id,
                review_id = %request.id,
                error = %err,
                "failed to notify reviewer; request stays open"
            );
        }

        emit(
            events,
            StepEvent::ReviewRequested {
                step_id: step_id.clone(),
                request,
            },
        )
        .await;

        let resolved = match decision.await {
            Ok(resolved) => resolved,
            Err(_) => {
                emit(
                    events,
                    StepEvent::Failed {
                        step_id,
                        attempts: 1,
                        error: "review gate closed before a decision was submitted".to_string(),
                    },
                )
                .await;
                return StepOutcome::Failed;
            }
        };

        emit(
            events,
            StepEvent::ReviewResolved {
                step_id: step_id.clone(),
                request: resolved.clone(),
            },
        )
        .await;

        if resolved.status == ReviewStatus::Approved {
            emit(
                events,
                StepEvent::Completed {
                    step_id,
                    output: resolved.changes,
                },
            )
            .await;
            return StepOutcome::Completed;
        }

        let decided_by = resolved.decided_by.as_deref().unwrap_or("unknown");
        let error = match resolved.comments.as_deref() {
            Some(comments) => format!("review {} by '{decided_by}': {comments}", resolved.status),
            None => format!("review {} by '{decided_by}'", resolved.status),
        };
        emit(
            events,
            StepEvent::Failed {
                step_id,
                attempts: 1,
                error,
            },
        )
        .await;
        StepOutcome::Failed
    }
}

async fn emit(events: &mpsc::Sender<StepEvent>, event: StepEvent) {
    if let Err(err) = events.send(event).await {
        debug!(event = ?err.0, "step event dropped; orchestrator no longer listening");
    }
}
