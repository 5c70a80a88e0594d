// src/drift/source.rs

use async_trait::async_trait;

/// Baseline and recent observations of one feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureWindow {
    pub baseline: Vec<f64>,
    pub recent: Vec<f64>,
}

impl FeatureWindow {
    pub fn new(baseline: Vec<f64>, recent: Vec<f64>) -> Self {
        Self { baseline, recent }
    }
}

/// Where feature observations come from (feature store, warehouse, ...).
#[async_trait]
pub trait FeatureSource: Send + Sync {
    async fn window(&self, model_id: &str, feature: &str) -> anyhow::Result<FeatureWindow>;
}
