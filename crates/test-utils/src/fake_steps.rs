#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flowgate::exec::{StepBody, StepInput, StepRegistry};
use flowgate::types::{Params, StepType};
use serde_json::json;
use tokio::time::Instant;

/// Shared record of everything the scripted bodies saw.
#[derive(Debug, Default)]
pub struct StepJournal {
    /// `(step_id, attempt, start instant)` in start order.
    starts: Mutex<Vec<(String, u32, Instant)>>,
    /// Step ids in completion order.
    finished: Mutex<Vec<String>>,
    inputs: Mutex<HashMap<String, StepInput>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl StepJournal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn started(&self) -> Vec<String> {
        self.starts
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _, _)| id.clone())
            .collect()
    }

    pub fn attempts_of(&self, step_id: &str) -> u32 {
        self.starts
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _, _)| id == step_id)
            .count() as u32
    }

    /// Start instants of every attempt of `step_id`.
    pub fn attempt_instants(&self, step_id: &str) -> Vec<Instant> {
        self.starts
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _, _)| id == step_id)
            .map(|(_, _, at)| *at)
            .collect()
    }

    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }

    /// Last input a step body received for `step_id`.
    pub fn input_of(&self, step_id: &str) -> Option<StepInput> {
        self.inputs.lock().unwrap().get(step_id).cloned()
    }

    /// Highest number of bodies that were running at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    fn enter(&self, input: &StepInput) {
        self.starts
            .lock()
            .unwrap()
            .push((input.step_id.clone(), input.attempt, Instant::now()));
        self.inputs
            .lock()
            .unwrap()
            .insert(input.step_id.clone(), input.clone());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self, step_id: &str) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.finished.lock().unwrap().push(step_id.to_string());
    }
}

/// What a scripted body does for one step id.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Number of leading attempts that fail.
    pub fail_times: u32,
    /// Fail every attempt.
    pub always_fail: bool,
    /// Panic instead of returning an error on failing attempts.
    pub panic: bool,
    /// Simulated work before the outcome.
    pub delay: Option<Duration>,
    pub output: Params,
}

impl Script {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn fail_times(n: u32) -> Self {
        Self {
            fail_times: n,
            ..Self::default()
        }
    }

    pub fn always_fail() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            always_fail: true,
            panic: true,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_output(mut self, key: &str, value: serde_json::Value) -> Self {
        self.output.insert(key.to_string(), value);
        self
    }
}

/// A step body driven by per-step scripts. Steps without a script succeed
/// immediately and output `{"step": <id>}`.
pub struct ScriptedSteps {
    journal: Arc<StepJournal>,
    scripts: HashMap<String, Script>,
}

impl ScriptedSteps {
    pub fn new(journal: Arc<StepJournal>) -> Self {
        Self {
            journal,
            scripts: HashMap::new(),
        }
    }

    pub fn script(mut self, step_id: &str, script: Script) -> Self {
        self.scripts.insert(step_id.to_string(), script);
        self
    }

    /// Registry with this body behind every executable step type.
    pub fn into_registry(self) -> StepRegistry {
        let body: Arc<dyn StepBody> = Arc::new(self);
        let mut registry = StepRegistry::new();
        for step_type in StepType::ALL.iter().copied().filter(|t| !t.is_human_review()) {
            registry
                .register(step_type, Arc::clone(&body))
                .expect("register scripted body");
        }
        registry
    }
}

#[async_trait]
impl StepBody for ScriptedSteps {
    async fn run(&self, input: StepInput) -> anyhow::Result<Params> {
        let step_id = input.step_id.clone();
        let attempt = input.attempt;
        let script = self.scripts.get(&step_id).cloned().unwrap_or_default();

        self.journal.enter(&input);

        if let Some(delay) = script.delay {
            tokio::time::sleep(delay).await;
        }

        self.journal.leave(&step_id);

        let fails = script.always_fail || attempt <= script.fail_times;
        if fails {
            if script.panic {
                panic!("scripted panic in step '{step_id}'");
            }
            anyhow::bail!("scripted failure of step '{step_id}' on attempt {attempt}");
        }

        let mut output = script.output;
        output
            .entry("step".to_string())
            .or_insert_with(|| json!(step_id));
        Ok(output)
    }
}
