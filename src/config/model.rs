// src/config/model.rs

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::StepId;
use crate::types::{BackoffStrategy, Params, StepType, TriggerType};

/// Workflow file as read from TOML, before validation.
///
/// ```toml
/// [workflow]
/// id = "retrain-credit-model"
/// timeout_secs = 3600
///
/// [retry]
/// max_attempts = 3
/// backoff = "exponential"
/// base_delay_ms = 1000
///
/// [[trigger]]
/// kind = "drift"
/// model_id = "credit-v2"
///
/// [[step]]
/// id = "ingest"
/// type = "ingestion"
///
/// [[step]]
/// id = "train"
/// type = "training"
/// depends_on = ["ingest"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawWorkflowDefinition {
    pub workflow: WorkflowSection,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default, rename = "trigger")]
    pub triggers: Vec<TriggerDefinition>,

    /// Steps in declaration order. The order is kept and used as the
    /// tie-break when several steps become ready together.
    #[serde(default, rename = "step")]
    pub steps: Vec<StepDefinition>,
}

/// `[workflow]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSection {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Overall timeout for one execution. Checked before each frontier is
    /// dispatched.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Validated, immutable workflow definition.
///
/// Only obtainable through `TryFrom<RawWorkflowDefinition>` (see
/// `config::validate`), so holding one means the dependency graph is known to
/// be closed and acyclic.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    id: String,
    name: Option<String>,
    steps: Vec<StepDefinition>,
    triggers: Vec<TriggerDefinition>,
    retry: RetryPolicy,
    timeout: Option<Duration>,
}

impl WorkflowDefinition {
    pub(crate) fn new_unchecked(raw: RawWorkflowDefinition) -> Self {
        Self {
            id: raw.workflow.id,
            name: raw.workflow.name,
            steps: raw.steps,
            triggers: raw.triggers,
            retry: raw.retry,
            timeout: raw.workflow.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn triggers(&self) -> &[TriggerDefinition] {
        &self.triggers
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// One `[[step]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: StepId,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "type")]
    pub step_type: StepType,

    /// Steps that must complete before this one may start.
    #[serde(default)]
    pub depends_on: Vec<StepId>,

    #[serde(default)]
    pub inputs: Params,

    /// Required for `human_review` steps, rejected on every other type.
    #[serde(default)]
    pub review: Option<ReviewSettings>,
}

impl StepDefinition {
    /// Human-facing name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Review gate settings for a `human_review` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSettings {
    pub reviewer: String,

    /// How long the reviewer has before the request is reported as overdue.
    #[serde(default = "default_review_deadline_secs")]
    pub deadline_secs: u64,
}

fn default_review_deadline_secs() -> u64 {
    48 * 60 * 60
}

/// `[[trigger]]` entries describe how executions of this workflow are started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerDefinition {
    Schedule { cron: String },
    Event { event: String },
    Manual,
    Drift { model_id: String },
}

impl TriggerDefinition {
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            TriggerDefinition::Schedule { .. } => TriggerType::Schedule,
            TriggerDefinition::Event { .. } => TriggerType::Event,
            TriggerDefinition::Manual => TriggerType::Manual,
            TriggerDefinition::Drift { .. } => TriggerType::Drift,
        }
    }
}

/// `[retry]` section. Delay computation lives in `exec::retry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    #[serde(default = "default_max_attempts", alias = "max_retries")]
    pub max_attempts: u32,

    #[serde(default)]
    pub backoff: BackoffStrategy,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on any single delay.
    #[serde(default)]
    pub max_delay_ms: Option<u64>,

    /// Adds up to 10% random jitter to exponential delays.
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: BackoffStrategy::default(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: None,
            jitter: default_jitter(),
        }
    }
}
