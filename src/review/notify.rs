// src/review/notify.rs

use async_trait::async_trait;
use tracing::info;

use crate::review::request::ReviewRequest;

/// Delivers "you have a review waiting" notices. Delivery mechanics live
/// outside the engine.
#[async_trait]
pub trait ReviewNotifier: Send + Sync {
    async fn notify_reviewer(&self, reviewer: &str, request: &ReviewRequest) -> anyhow::Result<()>;
}

/// Notifier that only writes a tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl ReviewNotifier for LogNotifier {
    async fn notify_reviewer(&self, reviewer: &str, request: &ReviewRequest) -> anyhow::Result<()> {
        info!(
            reviewer = %reviewer,
            review_id = %request.id,
            step = %request.step_id,
            deadline = %request.deadline,
            "review requested"
        );
        Ok(())
    }
}
