#![allow(dead_code)]

use flowgate::config::{
    RawWorkflowDefinition, RetryPolicy, ReviewSettings, StepDefinition, TriggerDefinition,
    WorkflowDefinition, WorkflowSection,
};
use flowgate::errors::Result;
use flowgate::types::{BackoffStrategy, Params, StepType};

/// Builder for `WorkflowDefinition` to simplify test setup.
///
/// Defaults to fixed 10ms backoff with a single attempt so tests opt into
/// retries explicitly.
pub struct WorkflowBuilder {
    raw: RawWorkflowDefinition,
}

impl WorkflowBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            raw: RawWorkflowDefinition {
                workflow: WorkflowSection {
                    id: id.to_string(),
                    name: None,
                    timeout_secs: None,
                },
                retry: RetryPolicy {
                    max_attempts: 1,
                    backoff: BackoffStrategy::Fixed,
                    base_delay_ms: 10,
                    max_delay_ms: None,
                    jitter: false,
                },
                triggers: Vec::new(),
                steps: Vec::new(),
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.raw.workflow.name = Some(name.to_string());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.raw.workflow.timeout_secs = Some(secs);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.raw.retry = retry;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.raw.retry.max_attempts = attempts;
        self
    }

    pub fn trigger(mut self, trigger: TriggerDefinition) -> Self {
        self.raw.triggers.push(trigger);
        self
    }

    pub fn step(mut self, step: StepBuilder) -> Self {
        self.raw.steps.push(step.build());
        self
    }

    pub fn raw(self) -> RawWorkflowDefinition {
        self.raw
    }

    pub fn try_build(self) -> Result<WorkflowDefinition> {
        WorkflowDefinition::try_from(self.raw)
    }

    pub fn build(self) -> WorkflowDefinition {
        self.try_build()
            .expect("Failed to build valid workflow from builder")
    }
}

/// Builder for `StepDefinition`.
pub struct StepBuilder {
    step: StepDefinition,
}

impl StepBuilder {
    pub fn new(id: &str, step_type: StepType) -> Self {
        Self {
            step: StepDefinition {
                id: id.to_string(),
                name: None,
                step_type,
                depends_on: Vec::new(),
                inputs: Params::new(),
                review: None,
            },
        }
    }

    /// A `human_review` step assigned to `reviewer` with a one-hour deadline.
    pub fn review(id: &str, reviewer: &str) -> Self {
        let mut builder = Self::new(id, StepType::HumanReview);
        builder.step.review = Some(ReviewSettings {
            reviewer: reviewer.to_string(),
            deadline_secs: 3600,
        });
        builder
    }

    pub fn name(mut self, name: &str) -> Self {
        self.step.name = Some(name.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.step.depends_on.push(dep.to_string());
        self
    }

    pub fn input(mut self, key: &str, value: serde_json::Value) -> Self {
        self.step.inputs.insert(key.to_string(), value);
        self
    }

    pub fn deadline_secs(mut self, secs: u64) -> Self {
        if let Some(review) = self.step.review.as_mut() {
            review.deadline_secs = secs;
        }
        self
    }

    pub fn build(self) -> StepDefinition {
        self.step
    }
}
