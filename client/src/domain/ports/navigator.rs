//! Driving-side callback fired when the login flow hands control back to the
//! rest of the application.

/// Port for leaving the login screen.
#[cfg_attr(test, mockall::automock)]
pub trait Navigator: Send + Sync {
    /// Move to the main screen.
    fn navigate_to_main(&self);
}

/// Navigator that only records the hand-off in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate_to_main(&self) {
        tracing::info!("navigating to main screen");
    }
}
