#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use flowgate::drift::{DriftScorer, FeatureSource, FeatureWindow};
use flowgate::review::{ReviewNotifier, ReviewRequest};

/// Scorer that returns a fixed score whatever the windows hold.
pub struct StaticScorer {
    pub score: f64,
}

impl StaticScorer {
    pub fn new(score: f64) -> Self {
        Self { score }
    }
}

impl DriftScorer for StaticScorer {
    fn name(&self) -> &str {
        "static"
    }

    fn score(&self, _baseline: &[f64], _recent: &[f64]) -> f64 {
        self.score
    }
}

/// Feature source serving canned windows. Unknown features and features
/// marked failing return an error.
#[derive(Default)]
pub struct StaticFeatureSource {
    windows: HashMap<String, FeatureWindow>,
    failing: HashSet<String>,
}

impl StaticFeatureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feature(mut self, feature: &str, baseline: Vec<f64>, recent: Vec<f64>) -> Self {
        self.windows
            .insert(feature.to_string(), FeatureWindow::new(baseline, recent));
        self
    }

    pub fn failing(mut self, feature: &str) -> Self {
        self.failing.insert(feature.to_string());
        self
    }
}

#[async_trait]
impl FeatureSource for StaticFeatureSource {
    async fn window(&self, model_id: &str, feature: &str) -> anyhow::Result<FeatureWindow> {
        if self.failing.contains(feature) {
            anyhow::bail!("feature store unavailable for {model_id}/{feature}");
        }
        self.windows
            .get(feature)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no window for {model_id}/{feature}"))
    }
}

/// Notifier that records who was notified, optionally failing every call.
#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: bool,
    notified: Mutex<Vec<(String, ReviewRequest)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn notified(&self) -> Vec<(String, ReviewRequest)> {
        self.notified.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReviewNotifier for RecordingNotifier {
    async fn notify_reviewer(&self, reviewer: &str, request: &ReviewRequest) -> anyhow::Result<()> {
        self.notified
            .lock()
            .unwrap()
            .push((reviewer.to_string(), request.clone()));
        if self.fail {
            anyhow::bail!("notification channel down");
        }
        Ok(())
    }
}
