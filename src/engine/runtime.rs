// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::dag::SchedulerStep;
use crate::engine::StepId;
use crate::exec::{StepEvent, StepExecutor, StepOutcome};
use crate::execution::{Execution, StepRuntimeState, StepStatus};
use crate::persistence::Persistence;

use super::core::ExecutionCore;

/// Drive loop of one execution.
///
/// This is the async IO shell around [`ExecutionCore`]: it fans each ready
/// frontier out on a `JoinSet`, feeds the resulting [`StepEvent`]s into the
/// core and hands changed step states to persistence. It is the only writer
/// of the execution record.
pub struct ExecutionRuntime {
    core: ExecutionCore,
    executor: Arc<StepExecutor>,
    persistence: Arc<dyn Persistence>,
    event_capacity: usize,
    started: Instant,
}

impl fmt::Debug for ExecutionRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionRuntime")
            .field("core", &self.core)
            .field("event_capacity", &self.event_capacity)
            .finish_non_exhaustive()
    }
}

impl ExecutionRuntime {
    pub fn new(
        core: ExecutionCore,
        executor: Arc<StepExecutor>,
        persistence: Arc<dyn Persistence>,
        event_capacity: usize,
    ) -> Self {
        Self {
            core,
            executor,
            persistence,
            event_capacity: event_capacity.max(1),
            started: Instant::now(),
        }
    }

    /// Main loop: plan, dispatch or skip, repeat until every step settled.
    /// Returns the terminal record.
    pub async fn run(mut self) -> Execution {
        let execution_id = self.core.record().read().id();
        info!(
            %execution_id,
            workflow = %self.core.definition().id(),
            "execution drive loop started"
        );

        loop {
            match self.core.next_step() {
                SchedulerStep::Dispatch(ready) => {
                    if let Some(limit) = self.core.definition().timeout() {
                        if self.started.elapsed() >= limit {
                            warn!(%execution_id, timeout_secs = limit.as_secs(), "execution timed out");
                            let changed = self.core.time_out(limit);
                            self.persist_steps(changed).await;
                            continue;
                        }
                    }
                    self.run_batch(ready).await;
                }
                SchedulerStep::Skip(unreachable) => {
                    let changed = self.core.skip(&unreachable);
                    self.persist_steps(changed).await;
                }
                SchedulerStep::Stalled(pending) => {
                    let changed = self.core.stall(&pending);
                    self.persist_steps(changed).await;
                }
                SchedulerStep::Waiting => {
                    // Batches are joined before planning again, so nothing
                    // can still be running here.
                    warn!(%execution_id, "scheduler waiting outside of a batch; stopping");
                    let running: Vec<StepId> = self
                        .core
                        .record()
                        .read()
                        .step_states()
                        .values()
                        .filter(|s| s.status() == StepStatus::Running)
                        .map(|s| s.step_id().to_string())
                        .collect();
                    let changed = self.core.fail_orphaned(&running);
                    self.persist_steps(changed).await;
                }
                SchedulerStep::Finished => break,
            }
        }

        let execution = self.core.finalize();
        if let Err(err) = self.persistence.save_execution(&execution).await {
            warn!(%execution_id, error = %err, "failed to persist final execution");
        }
        execution
    }

    /// Run one frontier concurrently and join it as a batch.
    async fn run_batch(&mut self, ready: Vec<StepId>) {
        debug!(?ready, "dispatching frontier");

        let (event_tx, mut event_rx) = mpsc::channel::<StepEvent>(self.event_capacity);
        let mut tasks: JoinSet<(StepId, StepOutcome)> = JoinSet::new();

        for dispatch in self.core.dispatches(&ready) {
            let executor = Arc::clone(&self.executor);
            let tx = event_tx.clone();
            let step_id = dispatch.step.id.clone();
            tasks.spawn(async move {
                let outcome = executor.execute(dispatch, tx).await;
                (step_id, outcome)
            });
        }
        drop(event_tx);

        loop {
            tokio::select! {
                biased;
                Some(event) = event_rx.recv() => self.handle_event(event).await,
                joined = tasks.join_next() => match joined {
                    Some(Ok((step_id, outcome))) => {
                        debug!(step = %step_id, ?outcome, "step task finished");
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "step task aborted");
                    }
                    None => break,
                },
            }
        }

        // Every sender is gone once the batch is joined.
        while let Some(event) = event_rx.recv().await {
            self.handle_event(event).await;
        }

        let changed = self.core.fail_orphaned(&ready);
        self.persist_steps(changed).await;
    }

    async fn handle_event(&mut self, event: StepEvent) {
        debug!(?event, "step event");
        let changed = self.core.apply_event(&event);
        self.persist_steps(changed).await;
    }

    /// Terminal step states are written before moving on; intermediate ones
    /// are written in the background.
    async fn persist_steps(&self, changed: Vec<StepRuntimeState>) {
        let execution_id = self.core.record().read().id();

        for state in changed {
            if state.status().is_terminal() {
                if let Err(err) = self
                    .persistence
                    .update_step_state(execution_id, state.step_id(), &state)
                    .await
                {
                    warn!(
                        %execution_id,
                        step = %state.step_id(),
                        error = %err,
                        "failed to persist step state"
                    );
                }
            } else {
                let persistence = Arc::clone(&self.persistence);
                tokio::spawn(async move {
                    if let Err(err) = persistence
                        .update_step_state(execution_id, state.step_id(), &state)
                        .await
                    {
                        warn!(
                            %execution_id,
                            step = %state.step_id(),
                            error = %err,
                            "failed to persist step state"
                        );
                    }
                });
            }
        }
    }
}
