//! The login flow as the login screen drives it.
//!
//! [`LoginOrchestrator`] runs one [`AuthSession`] operation at a time, loads
//! the game categories once the session is ready, and hands control to the
//! [`Navigator`] exactly once per process. Failures are reported to the
//! [`LoginObserver`] as player-facing messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::auth_session::{AuthError, AuthOutcome, AuthSession};
use super::data_sync_service::{DataSyncService, LoadedCategories};
use super::game_data::GameCatalog;
use super::ports::{AchievementError, AchievementService, LoginObserver, Navigator};
use super::{CategoryDescriptor, DataCategory, RemoteError, RemoteErrorKind};

/// Platform id of the achievement unlocked when a nickname is first set.
pub const WELCOME_ACHIEVEMENT_ID: &str = "achievement_welcome";

/// Message shown when a login operation is already running.
pub const BUSY_MESSAGE: &str = "A sign-in request is already in progress.";

/// Result of one orchestrated login step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStatus {
    /// The session is ready and navigation has happened.
    Navigated,
    /// The player must choose a nickname.
    NicknameRequired,
    /// Another operation was running; nothing was done.
    Busy,
    /// The step failed; the observer has been notified.
    Failed(AuthError),
}

/// Player-facing message for a login failure.
pub fn user_message(err: &AuthError) -> String {
    match err {
        AuthError::Remote(remote) => remote_message(remote).to_owned(),
        AuthError::Nickname(invalid) => format!("Please choose another nickname: {invalid}."),
        AuthError::InvalidState { .. } => "That action is not available right now.".to_owned(),
        AuthError::Credentials(_) => {
            "Saved login data could not be updated. Please try again.".to_owned()
        }
    }
}

fn remote_message(err: &RemoteError) -> &'static str {
    match err.kind() {
        RemoteErrorKind::NetworkFailure => {
            "Could not reach the server. Check your connection and try again."
        }
        RemoteErrorKind::Unauthenticated => "Sign-in failed. Please try again.",
        RemoteErrorKind::CorruptLocalIdentity => {
            "Saved guest data was invalid. Please sign in again."
        }
        RemoteErrorKind::RecordNotFound => "Your account data could not be found.",
        RemoteErrorKind::ValidationFailure => {
            "That nickname is already taken or not allowed. Please choose another."
        }
        RemoteErrorKind::PlatformUnsupported => {
            "This sign-in method is not available on this device."
        }
        RemoteErrorKind::Cancelled => "Sign-in was cancelled.",
        _ => "Something went wrong. Please try again.",
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Composes the session, data sync and navigation into the login flow.
pub struct LoginOrchestrator {
    session: Arc<AuthSession>,
    data: DataSyncService,
    achievements: Arc<dyn AchievementService>,
    navigator: Arc<dyn Navigator>,
    observer: Arc<dyn LoginObserver>,
    categories: Vec<&'static dyn CategoryDescriptor>,
    busy: AtomicBool,
    navigated: AtomicBool,
    loaded: Mutex<Option<LoadedCategories>>,
}

impl LoginOrchestrator {
    /// Create an orchestrator loading the game's login categories.
    pub fn new(
        session: Arc<AuthSession>,
        data: DataSyncService,
        achievements: Arc<dyn AchievementService>,
        navigator: Arc<dyn Navigator>,
        observer: Arc<dyn LoginObserver>,
    ) -> Self {
        Self {
            session,
            data,
            achievements,
            navigator,
            observer,
            categories: GameCatalog::login_categories().to_vec(),
            busy: AtomicBool::new(false),
            navigated: AtomicBool::new(false),
            loaded: Mutex::new(None),
        }
    }

    /// Replace the categories loaded once the session is ready.
    #[must_use]
    pub fn with_categories(mut self, categories: Vec<&'static dyn CategoryDescriptor>) -> Self {
        self.categories = categories;
        self
    }

    /// The underlying session.
    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    /// Whether a login operation is running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Whether navigation to the main screen has happened.
    pub fn has_navigated(&self) -> bool {
        self.navigated.load(Ordering::Acquire)
    }

    /// Category outcomes from the last completed load.
    pub fn loaded_categories(&self) -> Option<LoadedCategories> {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn busy_guard(&self) -> Option<BusyGuard<'_>> {
        let guard = BusyGuard::acquire(&self.busy);
        if guard.is_none() {
            debug!("login operation rejected; another is running");
            self.observer.on_error(BUSY_MESSAGE);
        }
        guard
    }

    /// Try the cached session token.
    ///
    /// A failure is reported through
    /// [`LoginObserver::on_token_login_failed`] so the screen can offer the
    /// other sign-in choices.
    pub async fn try_auto_login(&self) -> LoginStatus {
        let Some(_guard) = self.busy_guard() else {
            return LoginStatus::Busy;
        };
        match self.session.authenticate_auto().await {
            Ok(outcome) => self.after_login(outcome).await,
            Err(err @ AuthError::InvalidState { .. }) => self.report(err),
            Err(err) => {
                info!(error = %err, "automatic login failed");
                self.observer.on_token_login_failed();
                LoginStatus::Failed(err)
            }
        }
    }

    /// Sign in as a guest.
    pub async fn try_guest_login(&self) -> LoginStatus {
        let Some(_guard) = self.busy_guard() else {
            return LoginStatus::Busy;
        };
        match self.session.authenticate_guest().await {
            Ok(outcome) => self.after_login(outcome).await,
            Err(err) => self.report(err),
        }
    }

    /// Sign in through the federated identity provider.
    pub async fn try_federated_login(&self, cancel: &CancellationToken) -> LoginStatus {
        let Some(_guard) = self.busy_guard() else {
            return LoginStatus::Busy;
        };
        match self.session.authenticate_federated(cancel).await {
            Ok(outcome) => self.after_login(outcome).await,
            Err(err) => self.report(err),
        }
    }

    /// Submit the nickname typed into the nickname form.
    ///
    /// On acceptance the welcome achievement is unlocked, best-effort, before
    /// the categories load and navigation happens.
    pub async fn submit_nickname(&self, raw: &str) -> LoginStatus {
        let Some(_guard) = self.busy_guard() else {
            return LoginStatus::Busy;
        };
        match self.session.submit_nickname(raw).await {
            Ok(_) => {
                if let Err(err) = self.achievements.unlock(WELCOME_ACHIEVEMENT_ID).await {
                    warn!(error = %err, "welcome achievement unlock failed");
                }
                self.enter_main().await
            }
            Err(err) => self.report(err),
        }
    }

    /// Show the platform's achievement UI.
    pub async fn show_achievements(&self) -> Result<(), AchievementError> {
        self.achievements.show_ui().await.inspect_err(|err| {
            warn!(error = %err, "achievement UI unavailable");
        })
    }

    /// Save one category for the signed-in account.
    pub async fn save_category<T: Serialize>(
        &self,
        category: &DataCategory<T>,
        value: &T,
    ) -> Result<(), RemoteError> {
        self.data.save_category(category, value).await
    }

    async fn after_login(&self, outcome: AuthOutcome) -> LoginStatus {
        match outcome {
            AuthOutcome::Ready(_) => self.enter_main().await,
            AuthOutcome::NicknameRequired(_) => {
                self.observer.on_nickname_required();
                LoginStatus::NicknameRequired
            }
        }
    }

    async fn enter_main(&self) -> LoginStatus {
        let outcomes = self.data.load_all(&self.categories).await;
        let loaded = LoadedCategories::from(outcomes);
        for name in loaded.failed() {
            warn!(category = name, "category failed to load; continuing with defaults");
        }
        *self.loaded.lock().unwrap_or_else(PoisonError::into_inner) = Some(loaded);

        if self
            .navigated
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            info!("login complete; navigating to main screen");
            self.navigator.navigate_to_main();
        } else {
            debug!("navigation already happened; skipping");
        }
        LoginStatus::Navigated
    }

    fn report(&self, err: AuthError) -> LoginStatus {
        let message = user_message(&err);
        warn!(error = %err, user_message = %message, "login step failed");
        self.observer.on_error(&message);
        LoginStatus::Failed(err)
    }
}

#[cfg(test)]
#[path = "login_orchestrator_tests.rs"]
mod tests;
