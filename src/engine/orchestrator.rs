// src/engine/orchestrator.rs

//! The [`Engine`] facade: submissions, status queries, review decisions and
//! drift-triggered retraining.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DriftModelConfig, EngineConfig, WorkflowDefinition};
use crate::drift::{
    DriftMonitor, DriftReport, DriftScorer, DriftSignal, DriftSignalStatus,
    DuplicateRetrainingSuppressed, FeatureSource, PopulationStabilityIndex, RetrainingDecision,
    RetrainingGuard, Severity, SignalId, spawn_drift_watch,
};
use crate::engine::{ExecutionCore, ExecutionId, ExecutionRuntime};
use crate::errors::{FlowgateError, Result};
use crate::exec::{StepExecutor, StepRegistry};
use crate::execution::{Execution, ExecutionStatusReport, ExecutionTrigger};
use crate::persistence::{InMemoryPersistence, Persistence};
use crate::review::{
    LogNotifier, ReviewGate, ReviewId, ReviewNotifier, ReviewRequest, ReviewSubmission,
    ReviewTimeoutWarning,
};
use crate::types::Params;

/// Engine-wide tunables.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Capacity of the per-batch step event channel.
    pub event_channel_capacity: usize,
    /// Period used by [`Engine::start_drift_watch`].
    pub drift_check_interval: Duration,
    /// Finished executions, drift signals and suppression records kept in
    /// memory. The oldest are evicted first.
    pub history_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            event_channel_capacity: 64,
            drift_check_interval: Duration::from_secs(60 * 60),
            history_limit: 1024,
        }
    }
}

/// Builder for [`Engine`]. Every collaborator is injected here; nothing is
/// looked up globally.
pub struct EngineBuilder {
    registry: StepRegistry,
    persistence: Option<Arc<dyn Persistence>>,
    notifier: Arc<dyn ReviewNotifier>,
    scorer: Arc<dyn DriftScorer>,
    source: Option<Arc<dyn FeatureSource>>,
    models: Vec<DriftModelConfig>,
    options: EngineOptions,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            registry: StepRegistry::new(),
            persistence: None,
            notifier: Arc::new(LogNotifier),
            scorer: Arc::new(PopulationStabilityIndex::default()),
            source: None,
            models: Vec::new(),
            options: EngineOptions::default(),
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(mut self, registry: StepRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn ReviewNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn drift_scorer(mut self, scorer: Arc<dyn DriftScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn feature_source(mut self, source: Arc<dyn FeatureSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn drift_model(mut self, model: DriftModelConfig) -> Self {
        self.models.push(model);
        self
    }

    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Take the `[engine]` settings and drift models from a loaded engine
    /// config.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.options.event_channel_capacity = config.engine.event_channel_capacity;
        self.options.drift_check_interval =
            Duration::from_secs(config.engine.drift_check_interval_secs);
        self.options.history_limit = config.engine.history_limit;
        self.models.extend(config.models);
        self
    }

    pub fn build(self) -> Engine {
        let persistence = self
            .persistence
            .unwrap_or_else(|| Arc::new(InMemoryPersistence::new()));
        let gate = Arc::new(ReviewGate::new());
        let executor = Arc::new(StepExecutor::new(
            Arc::new(self.registry),
            Arc::clone(&gate),
            self.notifier,
        ));

        Engine {
            inner: Arc::new(EngineInner {
                persistence,
                executor,
                gate,
                executions: DashMap::new(),
                finished: Mutex::new(VecDeque::new()),
                drift: DriftMonitor::new(self.models, self.scorer, self.source)
                    .with_history_limit(self.options.history_limit),
                guard: RetrainingGuard::with_history_limit(self.options.history_limit),
                options: self.options,
            }),
        }
    }
}

#[derive(Clone)]
struct ExecutionHandle {
    definition: Arc<WorkflowDefinition>,
    record: Arc<RwLock<Execution>>,
    done: watch::Receiver<bool>,
}

struct EngineInner {
    persistence: Arc<dyn Persistence>,
    executor: Arc<StepExecutor>,
    gate: Arc<ReviewGate>,
    executions: DashMap<ExecutionId, ExecutionHandle>,
    /// Finished executions still held in `executions`, oldest first.
    finished: Mutex<VecDeque<ExecutionId>>,
    drift: DriftMonitor,
    guard: RetrainingGuard,
    options: EngineOptions,
}

/// Workflow execution engine. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("executions", &self.inner.executions.len())
            .field("registry", self.inner.executor.registry())
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Start an execution of a stored definition. Returns once the record
    /// exists and its drive loop is running.
    pub async fn submit_execution(&self, definition_id: &str, inputs: Params) -> Result<ExecutionId> {
        let definition = self.inner.persistence.load_definition(definition_id).await?;
        self.start(definition, inputs, ExecutionTrigger::Manual, false).await
    }

    /// Start an execution of an in-hand definition.
    ///
    /// A `Drift` trigger claims the model's retraining slot; if another
    /// execution holds it the submission fails with `RetrainingActive`.
    pub async fn submit_definition(
        &self,
        definition: Arc<WorkflowDefinition>,
        inputs: Params,
        trigger: ExecutionTrigger,
    ) -> Result<ExecutionId> {
        self.start(definition, inputs, trigger, false).await
    }

    /// Submit and wait for the terminal record.
    pub async fn run_definition(
        &self,
        definition: Arc<WorkflowDefinition>,
        inputs: Params,
    ) -> Result<Execution> {
        let id = self
            .start(definition, inputs, ExecutionTrigger::Manual, false)
            .await?;
        self.wait_for(id).await
    }

    /// `reserved` is set when the caller already holds the model's
    /// retraining slot through `RetrainingGuard::try_acquire`.
    async fn start(
        &self,
        definition: Arc<WorkflowDefinition>,
        inputs: Params,
        trigger: ExecutionTrigger,
        reserved: bool,
    ) -> Result<ExecutionId> {
        self.inner.executor.registry().ensure_covers(&definition)?;

        let execution = Execution::new(&definition, inputs, trigger);
        let execution_id = execution.id();
        let drift_model = execution.trigger().drift_model().map(str::to_string);

        if let Some(model_id) = drift_model.as_deref().filter(|_| !reserved) {
            if let Err(active) = self.inner.guard.try_claim(model_id, execution_id) {
                warn!(model = %model_id, ?active, "drift submission rejected; retraining already active");
                return Err(FlowgateError::RetrainingActive {
                    model_id: model_id.to_string(),
                    active,
                });
            }
        }

        if let Err(err) = self.inner.persistence.save_execution(&execution).await {
            if let Some(model_id) = drift_model.as_deref().filter(|_| !reserved) {
                self.inner.guard.release(model_id, execution_id);
            }
            return Err(err);
        }

        let record = Arc::new(RwLock::new(execution));
        let (done_tx, done_rx) = watch::channel(false);

        self.inner.executions.insert(
            execution_id,
            ExecutionHandle {
                definition: Arc::clone(&definition),
                record: Arc::clone(&record),
                done: done_rx,
            },
        );

        if let Some(model_id) = drift_model.as_deref().filter(|_| reserved) {
            self.inner.guard.bind(model_id, execution_id);
        }

        info!(
            %execution_id,
            workflow = %definition.id(),
            steps = definition.steps().len(),
            "execution submitted"
        );

        let runtime = ExecutionRuntime::new(
            ExecutionCore::new(definition, record),
            Arc::clone(&self.inner.executor),
            Arc::clone(&self.inner.persistence),
            self.inner.options.event_channel_capacity,
        );
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            let finished = runtime.run().await;
            if let Some(model_id) = drift_model {
                inner.guard.release(&model_id, execution_id);
            }
            inner.retire(execution_id);
            debug!(%execution_id, status = %finished.status(), "signalling execution done");
            let _ = done_tx.send(true);
        });

        Ok(execution_id)
    }

    fn handle(&self, execution_id: ExecutionId) -> Result<ExecutionHandle> {
        self.inner
            .executions
            .get(&execution_id)
            .map(|h| h.value().clone())
            .ok_or(FlowgateError::ExecutionNotFound(execution_id))
    }

    /// Wait until the execution is terminal and return its final record.
    pub async fn wait_for(&self, execution_id: ExecutionId) -> Result<Execution> {
        let mut handle = self.handle(execution_id)?;

        if handle.done.wait_for(|done| *done).await.is_err() {
            let record = handle.record.read();
            if !record.status().is_terminal() {
                return Err(FlowgateError::Other(anyhow::anyhow!(
                    "drive loop of execution {execution_id} ended before finishing"
                )));
            }
        }

        let snapshot = handle.record.read().clone();
        Ok(snapshot)
    }

    /// Drop a finished execution and its review requests from memory and
    /// return its final record. The persisted record is left alone.
    pub fn forget(&self, execution_id: ExecutionId) -> Result<Execution> {
        let handle = self.handle(execution_id)?;
        if !*handle.done.borrow() {
            return Err(FlowgateError::ExecutionStillRunning(execution_id));
        }

        self.inner.finished.lock().retain(|id| *id != execution_id);
        self.inner.evict(execution_id);

        let snapshot = handle.record.read().clone();
        Ok(snapshot)
    }

    /// Executions currently held in memory, running or finished.
    pub fn tracked_executions(&self) -> usize {
        self.inner.executions.len()
    }

    /// Progress projection taken under one read lock.
    pub fn status(&self, execution_id: ExecutionId) -> Result<ExecutionStatusReport> {
        let handle = self.handle(execution_id)?;
        let record = handle.record.read();
        Ok(ExecutionStatusReport::from_execution(&record, &handle.definition))
    }

    /// Snapshot of the execution record.
    pub fn execution(&self, execution_id: ExecutionId) -> Result<Execution> {
        let handle = self.handle(execution_id)?;
        let snapshot = handle.record.read().clone();
        Ok(snapshot)
    }

    pub fn submit_review_decision(
        &self,
        review_id: ReviewId,
        submission: ReviewSubmission,
    ) -> Result<ReviewRequest> {
        self.inner
            .gate
            .submit_decision(review_id, submission, Utc::now())
    }

    pub fn review(&self, review_id: ReviewId) -> Option<ReviewRequest> {
        self.inner.gate.get(review_id)
    }

    pub fn pending_reviews(&self) -> Vec<ReviewRequest> {
        self.inner.gate.pending_requests()
    }

    pub fn overdue_reviews(&self, now: DateTime<Utc>) -> Vec<ReviewTimeoutWarning> {
        self.inner.gate.overdue(now)
    }

    /// Score a model and, on a critical signal, attempt one retraining
    /// submission.
    pub async fn detect_drift(&self, model_id: &str) -> Result<DriftReport> {
        let signals = self.inner.drift.evaluate(model_id).await?;

        let trigger = signals
            .iter()
            .filter(|s| s.severity == Severity::Critical)
            .max_by(|a, b| a.score.total_cmp(&b.score));

        let retraining = match trigger {
            Some(signal) => {
                let model = self.inner.drift.model(model_id)?;
                Some(self.trigger_retraining(model, signal).await?)
            }
            None => None,
        };

        Ok(DriftReport {
            model_id: model_id.to_string(),
            signals,
            retraining,
        })
    }

    async fn trigger_retraining(
        &self,
        model: &DriftModelConfig,
        signal: &DriftSignal,
    ) -> Result<RetrainingDecision> {
        if let Err(suppressed) = self.inner.guard.try_acquire(signal) {
            return Ok(RetrainingDecision::Suppressed(suppressed));
        }

        let mut inputs = Params::new();
        inputs.insert("model_id".into(), Value::String(model.model_id.clone()));
        inputs.insert("feature".into(), Value::String(signal.feature.clone()));
        inputs.insert("drift_score".into(), json!(signal.score));
        inputs.insert("severity".into(), Value::String(signal.severity.to_string()));

        let submitted = async {
            let definition = self
                .inner
                .persistence
                .load_definition(&model.retraining_workflow)
                .await?;
            let trigger = ExecutionTrigger::Drift {
                model_id: model.model_id.clone(),
            };
            self.start(definition, inputs, trigger, true).await
        }
        .await;

        match submitted {
            Ok(execution_id) => {
                info!(
                    model = %model.model_id,
                    %execution_id,
                    workflow = %model.retraining_workflow,
                    score = signal.score,
                    "critical drift; retraining submitted"
                );
                Ok(RetrainingDecision::Submitted { execution_id })
            }
            Err(err) => {
                warn!(model = %model.model_id, error = %err, "retraining submission failed");
                self.inner.guard.abandon(&model.model_id);
                Err(err)
            }
        }
    }

    pub fn update_drift_signal(&self, id: SignalId, status: DriftSignalStatus) -> Result<DriftSignal> {
        self.inner.drift.update_status(id, status)
    }

    /// Recorded drift signals, oldest first.
    pub fn drift_signals(&self, model_id: Option<&str>) -> Vec<DriftSignal> {
        self.inner.drift.signals(model_id)
    }

    pub fn suppressed_retraining(&self) -> Vec<DuplicateRetrainingSuppressed> {
        self.inner.guard.suppressed()
    }

    /// Execution currently holding the model's retraining slot.
    pub fn active_retraining(&self, model_id: &str) -> Option<ExecutionId> {
        self.inner.guard.active(model_id)
    }

    pub fn drift_models(&self) -> Vec<String> {
        self.inner.drift.model_ids()
    }

    pub fn drift_check_interval(&self) -> Duration {
        self.inner.options.drift_check_interval
    }

    /// Watch every configured model at the configured drift interval.
    pub fn start_drift_watch(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        spawn_drift_watch(
            self.clone(),
            self.drift_models(),
            self.drift_check_interval(),
            shutdown,
        )
    }
}

impl EngineInner {
    /// Record a finished execution and evict the oldest ones past the
    /// history limit.
    fn retire(&self, execution_id: ExecutionId) {
        let evicted: Vec<ExecutionId> = {
            let mut finished = self.finished.lock();
            finished.push_back(execution_id);
            let excess = finished
                .len()
                .saturating_sub(self.options.history_limit.max(1));
            finished.drain(..excess).collect()
        };

        for old in evicted {
            self.evict(old);
        }
    }

    fn evict(&self, execution_id: ExecutionId) {
        let removed = self.executions.remove(&execution_id).is_some();
        let reviews = self.gate.forget_execution(execution_id);
        debug!(%execution_id, removed, reviews, "execution evicted from memory");
    }
}
