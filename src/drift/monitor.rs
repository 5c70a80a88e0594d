// src/drift/monitor.rs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::config::DriftModelConfig;
use crate::drift::scorer::{DriftScorer, non_finite_rate};
use crate::drift::signal::{DriftKind, DriftSignal, DriftSignalStatus, SignalId};
use crate::drift::source::FeatureSource;
use crate::errors::{FlowgateError, Result};

/// Scores configured models and keeps the history of every signal raised.
pub struct DriftMonitor {
    models: HashMap<String, DriftModelConfig>,
    scorer: Arc<dyn DriftScorer>,
    source: Option<Arc<dyn FeatureSource>>,
    signals: DashMap<SignalId, DriftSignal>,
    history_limit: usize,
}

/// Default number of drift signals kept in the history.
pub const DEFAULT_SIGNAL_HISTORY: usize = 1024;

impl DriftMonitor {
    pub fn new(
        models: Vec<DriftModelConfig>,
        scorer: Arc<dyn DriftScorer>,
        source: Option<Arc<dyn FeatureSource>>,
    ) -> Self {
        let models = models
            .into_iter()
            .map(|m| (m.model_id.clone(), m))
            .collect();
        Self {
            models,
            scorer,
            source,
            signals: DashMap::new(),
            history_limit: DEFAULT_SIGNAL_HISTORY,
        }
    }

    /// Keep at most `limit` signals; the oldest are dropped first.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn model(&self, model_id: &str) -> Result<&DriftModelConfig> {
        self.models
            .get(model_id)
            .ok_or_else(|| FlowgateError::UnknownModel(model_id.to_string()))
    }

    pub fn model_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.models.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Score every tracked feature of `model_id` and record the signals.
    ///
    /// A feature whose window cannot be fetched is logged and skipped.
    pub async fn evaluate(&self, model_id: &str) -> Result<Vec<DriftSignal>> {
        let model = self.model(model_id)?;
        let source = self.source.as_ref().ok_or_else(|| {
            FlowgateError::ConfigError("no feature source configured for drift detection".into())
        })?;

        let mut signals = Vec::new();
        for feature in &model.features {
            let window = match source.window(model_id, feature).await {
                Ok(w) => w,
                Err(err) => {
                    warn!(model = %model_id, %feature, error = %err, "failed to fetch feature window; skipping feature");
                    continue;
                }
            };

            let now = Utc::now();
            let score = self.scorer.score(&window.baseline, &window.recent);
            signals.push(DriftSignal::new(
                model_id,
                feature,
                DriftKind::Statistical,
                score,
                model.threshold,
                now,
            ));

            if let Some(dq_threshold) = model.data_quality_threshold {
                let rate = non_finite_rate(&window.recent);
                signals.push(DriftSignal::new(
                    model_id,
                    feature,
                    DriftKind::DataQuality,
                    rate,
                    dq_threshold,
                    now,
                ));
            }
        }

        for signal in &signals {
            info!(
                model = %signal.model_id,
                feature = %signal.feature,
                kind = ?signal.kind,
                scorer = self.scorer.name(),
                score = signal.score,
                threshold = signal.threshold,
                severity = %signal.severity,
                "drift signal recorded"
            );
            self.signals.insert(signal.id, signal.clone());
        }
        self.trim_history();

        Ok(signals)
    }

    /// Recorded signals, oldest first, optionally for one model.
    pub fn signals(&self, model_id: Option<&str>) -> Vec<DriftSignal> {
        let mut signals: Vec<DriftSignal> = self
            .signals
            .iter()
            .filter(|s| model_id.is_none_or(|m| s.model_id == m))
            .map(|s| s.value().clone())
            .collect();
        signals.sort_by_key(|s| s.id);
        signals
    }

    /// Signal ids are v7 UUIDs, so the smallest ids are the oldest.
    fn trim_history(&self) {
        let excess = self.signals.len().saturating_sub(self.history_limit);
        if excess == 0 {
            return;
        }
        let mut ids: Vec<SignalId> = self.signals.iter().map(|s| *s.key()).collect();
        ids.sort();
        for id in ids.into_iter().take(excess) {
            self.signals.remove(&id);
        }
        debug!(dropped = excess, "drift signal history trimmed");
    }

    pub fn update_status(&self, id: SignalId, status: DriftSignalStatus) -> Result<DriftSignal> {
        let mut signal = self
            .signals
            .get_mut(&id)
            .ok_or(FlowgateError::SignalNotFound(id))?;
        signal.transition(status)?;
        info!(signal_id = %id, %status, "drift signal status updated");
        Ok(signal.clone())
    }
}
