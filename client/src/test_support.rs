//! Test doubles shared by unit tests (in `src/`) and integration tests (in
//! `tests/`).
//!
//! Compiled for `cfg(test)` and when the `test-support` feature is enabled.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::domain::ports::{
    AchievementError, AchievementService, IdentityProvider, IdentityProviderError,
    LoginObserver, Navigator, SignInStatus,
};
use crate::domain::{Identity, IdentitySource};
use crate::outbound::credentials::FileCredentialStore;

/// Identity source returning a fixed identity.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    identity: Mutex<Option<Identity>>,
}

impl StaticIdentity {
    /// Source returning `identity`.
    pub fn new(identity: Option<Identity>) -> Self {
        Self {
            identity: Mutex::new(identity),
        }
    }

    /// Replace the identity returned from now on.
    pub fn set(&self, identity: Option<Identity>) {
        *self.identity.lock().unwrap_or_else(PoisonError::into_inner) = identity;
    }
}

impl IdentitySource for StaticIdentity {
    fn current_identity(&self) -> Option<Identity> {
        self.identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Identity provider replaying scripted answers.
///
/// Each call pops the next scripted result; an exhausted script fails with
/// [`IdentityProviderError::Failed`].
#[derive(Debug, Default)]
pub struct ScriptedIdentityProvider {
    signed_in: bool,
    sign_ins: Mutex<VecDeque<Result<SignInStatus, IdentityProviderError>>>,
    codes: Mutex<VecDeque<Result<Option<String>, IdentityProviderError>>>,
    code_requests: AtomicUsize,
}

impl ScriptedIdentityProvider {
    /// Provider that reports an existing sign-in and hands out `code`.
    pub fn signed_in_with_code(code: &str) -> Self {
        Self {
            signed_in: true,
            ..Self::default()
        }
        .then_code(Ok(Some(code.to_owned())))
    }

    /// Append a sign-in result.
    #[must_use]
    pub fn then_sign_in(self, result: Result<SignInStatus, IdentityProviderError>) -> Self {
        self.sign_ins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
        self
    }

    /// Append an authorisation code result.
    #[must_use]
    pub fn then_code(self, result: Result<Option<String>, IdentityProviderError>) -> Self {
        self.codes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
        self
    }

    /// Number of authorisation codes requested.
    pub fn code_requests(&self) -> usize {
        self.code_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for ScriptedIdentityProvider {
    fn is_authenticated(&self) -> bool {
        self.signed_in
    }

    async fn authenticate(&self) -> Result<SignInStatus, IdentityProviderError> {
        self.sign_ins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(IdentityProviderError::failed("no scripted sign-in")))
    }

    async fn request_authorization_code(
        &self,
        _force_refresh: bool,
    ) -> Result<Option<String>, IdentityProviderError> {
        self.code_requests.fetch_add(1, Ordering::SeqCst);
        self.codes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(IdentityProviderError::failed("no scripted code")))
    }
}

/// Navigator counting navigations.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    navigations: AtomicUsize,
}

impl RecordingNavigator {
    /// Number of navigations to the main screen.
    pub fn count(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_to_main(&self) {
        self.navigations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Observer recording every notification.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    errors: Mutex<Vec<String>>,
    token_failures: AtomicUsize,
    nickname_requests: AtomicUsize,
}

impl RecordingObserver {
    /// Error messages reported so far.
    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of failed automatic logins reported.
    pub fn token_failures(&self) -> usize {
        self.token_failures.load(Ordering::SeqCst)
    }

    /// Number of nickname prompts reported.
    pub fn nickname_requests(&self) -> usize {
        self.nickname_requests.load(Ordering::SeqCst)
    }
}

impl LoginObserver for RecordingObserver {
    fn on_error(&self, message: &str) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_owned());
    }

    fn on_token_login_failed(&self) {
        self.token_failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_nickname_required(&self) {
        self.nickname_requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Achievement service recording unlocks, optionally failing them.
#[derive(Debug, Default)]
pub struct RecordingAchievements {
    fail_unlocks: bool,
    unlocked: Mutex<Vec<String>>,
}

impl RecordingAchievements {
    /// Service whose unlocks all fail.
    pub fn failing() -> Self {
        Self {
            fail_unlocks: true,
            ..Self::default()
        }
    }

    /// Achievement ids unlock was requested for, including failed ones.
    pub fn unlocked(&self) -> Vec<String> {
        self.unlocked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AchievementService for RecordingAchievements {
    async fn unlock(&self, achievement_id: &str) -> Result<(), AchievementError> {
        self.unlocked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(achievement_id.to_owned());
        if self.fail_unlocks {
            Err(AchievementError::failed("platform rejected unlock"))
        } else {
            Ok(())
        }
    }

    async fn show_ui(&self) -> Result<(), AchievementError> {
        Ok(())
    }
}

/// File credential store in a fresh temporary directory.
///
/// The directory lives as long as the returned [`TempDir`].
///
/// # Panics
///
/// Panics when the temporary directory cannot be created.
pub fn temp_credential_store() -> (TempDir, FileCredentialStore) {
    let dir = TempDir::new().unwrap_or_else(|error| panic!("create temp dir: {error}"));
    let store = FileCredentialStore::open(dir.path())
        .unwrap_or_else(|error| panic!("open credential store: {error}"));
    (dir, store)
}
