// src/drift/scorer.rs

//! Drift scoring functions.

/// Compares a recent feature window against its baseline. Higher is more
/// drifted; the engine grades scores against per-model thresholds.
pub trait DriftScorer: Send + Sync {
    fn name(&self) -> &str;

    fn score(&self, baseline: &[f64], recent: &[f64]) -> f64;
}

/// Population stability index over equal-width bins spanning the baseline
/// range. Values outside the range fall into the edge bins.
#[derive(Debug, Clone, Copy)]
pub struct PopulationStabilityIndex {
    pub bins: usize,
    /// Added to every bin share so empty bins do not blow up the logarithm.
    pub epsilon: f64,
}

impl Default for PopulationStabilityIndex {
    fn default() -> Self {
        Self {
            bins: 10,
            epsilon: 1e-4,
        }
    }
}

impl PopulationStabilityIndex {
    fn shares(&self, values: &[f64], min: f64, width: f64, bins: usize) -> Vec<f64> {
        let mut counts = vec![0usize; bins];
        let mut total = 0usize;

        for v in values.iter().copied().filter(|v| v.is_finite()) {
            let idx = if width > 0.0 {
                (((v - min) / width).floor().max(0.0) as usize).min(bins - 1)
            } else {
                0
            };
            counts[idx] += 1;
            total += 1;
        }

        counts
            .into_iter()
            .map(|c| {
                let share = if total == 0 {
                    0.0
                } else {
                    c as f64 / total as f64
                };
                share + self.epsilon
            })
            .collect()
    }
}

impl DriftScorer for PopulationStabilityIndex {
    fn name(&self) -> &str {
        "psi"
    }

    fn score(&self, baseline: &[f64], recent: &[f64]) -> f64 {
        let finite = || baseline.iter().copied().filter(|v| v.is_finite());
        let (Some(min), Some(max)) = (
            finite().reduce(f64::min),
            finite().reduce(f64::max),
        ) else {
            return 0.0;
        };

        let bins = self.bins.max(1);
        let width = (max - min) / bins as f64;
        let expected = self.shares(baseline, min, width, bins);
        let actual = self.shares(recent, min, width, bins);

        expected
            .iter()
            .zip(actual.iter())
            .map(|(e, a)| (a - e) * (a / e).ln())
            .sum()
    }
}

/// Share of non-finite values (NaN, infinities) in `values`.
pub fn non_finite_rate(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let bad = values.iter().filter(|v| !v.is_finite()).count();
    bad as f64 / values.len() as f64
}
