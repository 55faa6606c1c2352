//! Side effects a settlement triggers for each participant. Both are
//! best-effort: failures are logged by the caller and never undo a
//! settlement.

use async_trait::async_trait;
use tracing::{debug, info};

#[async_trait]
pub trait AchievementVerifier: Send + Sync {
    async fn verify_achievements(&self, user_id: &str) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_notification(&self, message: &str, user_id: &str) -> anyhow::Result<()>;
}

/// Writes notifications to the log instead of pushing them to a device.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_notification(&self, message: &str, user_id: &str) -> anyhow::Result<()> {
        info!(user_id, message, "notification");
        Ok(())
    }
}

/// Records that an achievement check was due; no achievements are evaluated.
pub struct LogAchievements;

#[async_trait]
impl AchievementVerifier for LogAchievements {
    async fn verify_achievements(&self, user_id: &str) -> anyhow::Result<()> {
        debug!(user_id, "achievement check requested");
        Ok(())
    }
}
