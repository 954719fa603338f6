//! Driven port for platform achievements.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors raised by achievement adapters.
    pub enum AchievementError {
        /// Achievements are not available on this platform.
        Unsupported => "achievements are not supported on this platform",
        /// The platform rejected or failed the request.
        Failed { message: String } => "achievement request failed: {message}",
    }
}

/// Port for unlocking achievements and showing the platform UI.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AchievementService: Send + Sync {
    /// Unlock the achievement with the given platform id.
    async fn unlock(&self, achievement_id: &str) -> Result<(), AchievementError>;

    /// Show the platform's achievement UI.
    async fn show_ui(&self) -> Result<(), AchievementError>;
}

/// Achievement service that accepts every request and does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpAchievementService;

#[async_trait]
impl AchievementService for NoOpAchievementService {
    async fn unlock(&self, achievement_id: &str) -> Result<(), AchievementError> {
        tracing::debug!(achievement_id, "achievement unlock ignored");
        Ok(())
    }

    async fn show_ui(&self) -> Result<(), AchievementError> {
        Ok(())
    }
}
