// src/drift/guard.rs

//! At most one active retraining execution per model.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::drift::signal::{DriftSignal, Severity, SignalId};
use crate::engine::ExecutionId;

/// A retraining request dropped because one is already active for the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateRetrainingSuppressed {
    pub model_id: String,
    pub signal_id: SignalId,
    pub severity: Severity,
    /// `None` while the winning submission has not been bound yet.
    pub active_execution: Option<ExecutionId>,
    pub suppressed_at: DateTime<Utc>,
}

/// What a critical detection led to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetrainingDecision {
    Submitted { execution_id: ExecutionId },
    Suppressed(DuplicateRetrainingSuppressed),
}

#[derive(Debug, Clone, Copy)]
struct ActiveRetraining {
    execution_id: Option<ExecutionId>,
}

#[derive(Debug)]
pub struct RetrainingGuard {
    active: DashMap<String, ActiveRetraining>,
    /// Most recent suppressions, oldest first.
    suppressed: Mutex<VecDeque<DuplicateRetrainingSuppressed>>,
    history_limit: usize,
}

impl RetrainingGuard {
    /// Keep at most `limit` suppression records; older ones are dropped.
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            active: DashMap::new(),
            suppressed: Mutex::new(VecDeque::new()),
            history_limit: limit.max(1),
        }
    }

    /// Claim the model's retraining slot. Check and set happen under the
    /// map's entry lock, so concurrent callers cannot both win.
    pub fn try_acquire(
        &self,
        signal: &DriftSignal,
    ) -> std::result::Result<(), DuplicateRetrainingSuppressed> {
        match self.active.entry(signal.model_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(ActiveRetraining { execution_id: None });
                debug!(model = %signal.model_id, "retraining slot claimed");
                Ok(())
            }
            Entry::Occupied(slot) => {
                let record = DuplicateRetrainingSuppressed {
                    model_id: signal.model_id.clone(),
                    signal_id: signal.id,
                    severity: signal.severity,
                    active_execution: slot.get().execution_id,
                    suppressed_at: Utc::now(),
                };
                drop(slot);
                info!(
                    model = %record.model_id,
                    signal_id = %record.signal_id,
                    active_execution = ?record.active_execution,
                    "retraining already active; suppressing duplicate"
                );
                let mut history = self.suppressed.lock();
                history.push_back(record.clone());
                while history.len() > self.history_limit {
                    history.pop_front();
                }
                Err(record)
            }
        }
    }

    /// Attach the execution to a slot reserved by [`try_acquire`].
    ///
    /// [`try_acquire`]: RetrainingGuard::try_acquire
    pub fn bind(&self, model_id: &str, execution_id: ExecutionId) {
        match self.active.get_mut(model_id) {
            Some(mut slot) if slot.execution_id.is_none() => {
                slot.execution_id = Some(execution_id);
            }
            Some(slot) => {
                warn!(
                    model = %model_id,
                    current = ?slot.execution_id,
                    %execution_id,
                    "retraining slot already bound to another execution"
                );
            }
            None => warn!(model = %model_id, %execution_id, "binding a retraining slot that was never reserved"),
        }
    }

    /// Claim a vacant slot directly for `execution_id`. On conflict returns
    /// the execution currently holding it (`None` while reserved but unbound).
    pub fn try_claim(
        &self,
        model_id: &str,
        execution_id: ExecutionId,
    ) -> std::result::Result<(), Option<ExecutionId>> {
        match self.active.entry(model_id.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(ActiveRetraining {
                    execution_id: Some(execution_id),
                });
                debug!(model = %model_id, %execution_id, "retraining slot claimed by submission");
                Ok(())
            }
            Entry::Occupied(slot) => Err(slot.get().execution_id),
        }
    }

    /// Free the slot if `execution_id` holds it.
    pub fn release(&self, model_id: &str, execution_id: ExecutionId) {
        let removed = self
            .active
            .remove_if(model_id, |_, a| a.execution_id == Some(execution_id));
        if removed.is_some() {
            debug!(model = %model_id, %execution_id, "retraining slot released");
        }
    }

    /// Free a claimed slot whose submission never produced an execution.
    pub fn abandon(&self, model_id: &str) {
        self.active
            .remove_if(model_id, |_, a| a.execution_id.is_none());
    }

    pub fn active(&self, model_id: &str) -> Option<ExecutionId> {
        self.active.get(model_id).and_then(|a| a.execution_id)
    }

    pub fn suppressed(&self) -> Vec<DuplicateRetrainingSuppressed> {
        self.suppressed.lock().iter().cloned().collect()
    }
}
