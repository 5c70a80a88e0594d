// src/drift/watch.rs

//! Periodic drift detection, driven from outside the engine core.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::Engine;

/// Run `detect_drift` for each model every `interval` and sweep overdue
/// reviews, until `shutdown` is cancelled.
///
/// The first pass runs immediately.
pub fn spawn_drift_watch(
    engine: Engine,
    models: Vec<String>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(?models, interval_secs = interval.as_secs(), "drift watch started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            for model_id in &models {
                if shutdown.is_cancelled() {
                    break;
                }
                match engine.detect_drift(model_id).await {
                    Ok(report) => debug!(
                        model = %model_id,
                        signals = report.signals.len(),
                        retraining = ?report.retraining,
                        "drift pass finished"
                    ),
                    Err(err) => warn!(model = %model_id, error = %err, "drift detection failed"),
                }
            }

            let overdue = engine.overdue_reviews(Utc::now());
            if !overdue.is_empty() {
                debug!(count = overdue.len(), "overdue reviews found");
            }
        }

        info!("drift watch stopped");
    })
}
