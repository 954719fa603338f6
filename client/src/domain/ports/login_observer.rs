//! Observer port for login-screen notifications.
//!
//! A presentation layer implements this to show messages and switch between
//! the sign-in choices and the nickname form.

/// Port notified about login progress.
#[cfg_attr(test, mockall::automock)]
pub trait LoginObserver: Send + Sync {
    /// A failure the player should see.
    fn on_error(&self, message: &str);

    /// Automatic login failed; the player must choose a sign-in method.
    fn on_token_login_failed(&self);

    /// The account has no nickname yet; show the nickname form.
    fn on_nickname_required(&self);
}

/// Observer that writes every notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLoginObserver;

impl LoginObserver for TracingLoginObserver {
    fn on_error(&self, message: &str) {
        tracing::warn!(user_message = message, "login error");
    }

    fn on_token_login_failed(&self) {
        tracing::info!("automatic login unavailable; waiting for sign-in choice");
    }

    fn on_nickname_required(&self) {
        tracing::info!("nickname required");
    }
}
