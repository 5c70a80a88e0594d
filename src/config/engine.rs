// src/config/engine.rs

use serde::Deserialize;

/// Engine-level settings, independent of any single workflow.
///
/// ```toml
/// [engine]
/// event_channel_capacity = 64
/// drift_check_interval_secs = 3600
/// history_limit = 1024
///
/// [[model]]
/// model_id = "credit-v2"
/// threshold = 0.2
/// retraining_workflow = "retrain-credit-model"
/// features = ["loan_amount", "income"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSection,

    /// Models tracked by the drift monitor.
    #[serde(default, rename = "model")]
    pub models: Vec<DriftModelConfig>,
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Buffer size of the per-frontier step event channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Period of the optional background drift watch.
    #[serde(default = "default_drift_check_interval_secs")]
    pub drift_check_interval_secs: u64,

    /// How many finished executions, drift signals and suppression records
    /// the engine keeps in memory.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_event_channel_capacity() -> usize {
    64
}

fn default_drift_check_interval_secs() -> u64 {
    60 * 60
}

fn default_history_limit() -> usize {
    1024
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
            drift_check_interval_secs: default_drift_check_interval_secs(),
            history_limit: default_history_limit(),
        }
    }
}

/// `[[model]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct DriftModelConfig {
    pub model_id: String,

    /// Drift score at which a feature counts as drifted (ratio 1.0).
    pub threshold: f64,

    /// Id of the workflow definition submitted on critical drift.
    pub retraining_workflow: String,

    #[serde(default)]
    pub features: Vec<String>,

    /// When set, the share of non-finite values in the recent window is
    /// scored against this threshold as a data-quality signal.
    #[serde(default)]
    pub data_quality_threshold: Option<f64>,
}
