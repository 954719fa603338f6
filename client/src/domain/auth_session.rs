//! Identity acquisition state machine.
//!
//! [`AuthSession`] owns the session state and the current [`Identity`]; no
//! other component writes either. Every remote call goes through the queue.
//!
//! Transitions:
//!
//! ```text
//! Unauthenticated --auto--> AutoAuthenticating --ok--> Ready | NicknameRequired
//!                                              --fail--> AwaitingUserChoice
//! Unauthenticated | AwaitingUserChoice | Failed --guest|federated--> Authenticating
//! Authenticating --ok--> Ready | NicknameRequired
//!                --fail--> AwaitingUserChoice
//!                --corrupt identity wipe failed--> Failed
//! NicknameRequired --nickname accepted--> Ready
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ports::{
    CredentialStore, CredentialStoreError, IdentityProvider, IdentityProviderError, SignInStatus,
};
use super::queued_remote::QueuedRemote;
use super::{
    AuthGrant, AuthorizationCode, Identity, IdentitySource, IdentityValidationError, Nickname,
    RemoteError, RemoteErrorKind,
};

/// Login progress of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No login attempted yet.
    Unauthenticated,
    /// Cached token login in progress.
    AutoAuthenticating,
    /// Waiting for the player to pick a login method.
    AwaitingUserChoice,
    /// Guest or federated login in progress.
    Authenticating,
    /// Logged in; the account needs a nickname.
    NicknameRequired,
    /// Logged in and usable.
    Ready,
    /// The local identity could not be reset; a fresh login may still work.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unauthenticated => "unauthenticated",
            Self::AutoAuthenticating => "auto_authenticating",
            Self::AwaitingUserChoice => "awaiting_user_choice",
            Self::Authenticating => "authenticating",
            Self::NicknameRequired => "nickname_required",
            Self::Ready => "ready",
            Self::Failed => "failed",
        })
    }
}

/// Which login path produced a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPath {
    /// Cached session token.
    Token,
    /// Guest account.
    Guest,
    /// Federated identity provider.
    Federated,
}

impl fmt::Display for LoginPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Token => "token",
            Self::Guest => "guest",
            Self::Federated => "federated",
        })
    }
}

/// Which login paths send an account without a nickname to the nickname
/// form.
///
/// The default gates guest and federated logins but lets automatic token
/// logins through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NicknamePolicy {
    /// Gate automatic token logins.
    pub token: bool,
    /// Gate guest logins.
    pub guest: bool,
    /// Gate federated logins.
    pub federated: bool,
}

impl Default for NicknamePolicy {
    fn default() -> Self {
        Self {
            token: false,
            guest: true,
            federated: true,
        }
    }
}

impl NicknamePolicy {
    /// Whether `path` requires a nickname before the session is ready.
    pub fn requires_nickname(&self, path: LoginPath) -> bool {
        match path {
            LoginPath::Token => self.token,
            LoginPath::Guest => self.guest,
            LoginPath::Federated => self.federated,
        }
    }
}

/// Successful end of an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The session is ready.
    Ready(Identity),
    /// The account needs a nickname first.
    NicknameRequired(Identity),
}

impl AuthOutcome {
    /// The authenticated identity.
    pub fn identity(&self) -> &Identity {
        match self {
            Self::Ready(identity) | Self::NicknameRequired(identity) => identity,
        }
    }
}

/// Errors returned by [`AuthSession`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The operation is not allowed in the current state.
    #[error("cannot {operation} while the session is {state}")]
    InvalidState {
        /// Attempted operation.
        operation: &'static str,
        /// State at the time of the attempt.
        state: SessionState,
    },
    /// A remote or provider step failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// The submitted nickname is malformed.
    #[error("invalid nickname: {0}")]
    Nickname(#[from] IdentityValidationError),
    /// The local credential cache could not be updated.
    #[error(transparent)]
    Credentials(#[from] CredentialStoreError),
}

impl AuthError {
    /// Remote failure kind, when the error came from a remote step.
    pub fn remote_kind(&self) -> Option<RemoteErrorKind> {
        match self {
            Self::Remote(err) => Some(err.kind()),
            _ => None,
        }
    }
}

struct SessionInner {
    state: SessionState,
    identity: Option<Identity>,
}

/// Returns an abandoned login attempt to `AwaitingUserChoice`.
///
/// A completed attempt has already moved the state on, so dropping the guard
/// afterwards changes nothing.
struct AttemptGuard<'a> {
    session: &'a AuthSession,
    in_flight: SessionState,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.session.lock();
        if inner.state == self.in_flight {
            warn!(from = %inner.state, "login attempt abandoned before completing");
            inner.state = SessionState::AwaitingUserChoice;
        }
    }
}

/// Session state machine.
pub struct AuthSession {
    remote: QueuedRemote,
    credentials: Arc<dyn CredentialStore>,
    identity_provider: Arc<dyn IdentityProvider>,
    policy: NicknamePolicy,
    inner: Mutex<SessionInner>,
}

impl AuthSession {
    /// Create an unauthenticated session.
    pub fn new(
        remote: QueuedRemote,
        credentials: Arc<dyn CredentialStore>,
        identity_provider: Arc<dyn IdentityProvider>,
        policy: NicknamePolicy,
    ) -> Self {
        Self {
            remote,
            credentials,
            identity_provider,
            policy,
            inner: Mutex::new(SessionInner {
                state: SessionState::Unauthenticated,
                identity: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Current identity, `None` until a login succeeds.
    pub fn identity(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    /// Nickname policy in effect.
    pub fn policy(&self) -> NicknamePolicy {
        self.policy
    }

    fn begin(
        &self,
        operation: &'static str,
        allowed: &[SessionState],
        next: SessionState,
    ) -> Result<AttemptGuard<'_>, AuthError> {
        let mut inner = self.lock();
        if !allowed.contains(&inner.state) {
            return Err(AuthError::InvalidState {
                operation,
                state: inner.state,
            });
        }
        debug!(from = %inner.state, to = %next, operation, "session transition");
        inner.state = next;
        Ok(AttemptGuard {
            session: self,
            in_flight: next,
        })
    }

    fn set_state(&self, next: SessionState) {
        let mut inner = self.lock();
        if inner.state != next {
            debug!(from = %inner.state, to = %next, "session transition");
            inner.state = next;
        }
    }

    fn fail_attempt(&self, fallback: SessionState, err: impl Into<AuthError>) -> AuthError {
        let err = err.into();
        warn!(state = %fallback, error = %err, "login attempt failed");
        self.set_state(fallback);
        err
    }

    /// Try the cached session token.
    ///
    /// Without a cached token the attempt fails immediately with no remote
    /// call. Any failure lands in `AwaitingUserChoice`.
    pub async fn authenticate_auto(&self) -> Result<AuthOutcome, AuthError> {
        let _attempt = self.begin(
            "authenticate automatically",
            &[SessionState::Unauthenticated],
            SessionState::AutoAuthenticating,
        )?;

        let stored = match self.credentials.load() {
            Ok(stored) => stored,
            Err(err) => return Err(self.fail_attempt(SessionState::AwaitingUserChoice, err)),
        };
        let Some(token) = stored.session_token else {
            info!("no cached session token");
            return Err(self.fail_attempt(
                SessionState::AwaitingUserChoice,
                RemoteError::unauthenticated("no cached session token"),
            ));
        };

        match self.remote.authenticate_auto(token).await {
            Ok(grant) => Ok(self.accept_grant(grant, LoginPath::Token)),
            Err(err) => Err(self.fail_attempt(SessionState::AwaitingUserChoice, err)),
        }
    }

    /// Sign in as a guest, reusing the cached guest id when there is one.
    ///
    /// When the service rejects the cached id as corrupt, the local cache is
    /// wiped and the login retried exactly once without it.
    pub async fn authenticate_guest(&self) -> Result<AuthOutcome, AuthError> {
        let _attempt = self.begin(
            "sign in as guest",
            &[
                SessionState::Unauthenticated,
                SessionState::AwaitingUserChoice,
                SessionState::Failed,
            ],
            SessionState::Authenticating,
        )?;

        let cached_guest = match self.credentials.load() {
            Ok(stored) => stored.guest,
            Err(err) => {
                warn!(error = %err, "credential cache unreadable; signing in as a new guest");
                None
            }
        };

        let first = self.remote.authenticate_guest(cached_guest).await;
        let result = match first {
            Err(err) if err.kind() == RemoteErrorKind::CorruptLocalIdentity => {
                warn!(error = %err, "cached guest identity rejected; wiping and retrying once");
                if let Err(wipe) = self.credentials.clear() {
                    return Err(self.fail_attempt(SessionState::Failed, wipe));
                }
                self.remote.authenticate_guest(None).await
            }
            other => other,
        };

        match result {
            Ok(grant) => Ok(self.accept_grant(grant, LoginPath::Guest)),
            Err(err) => Err(self.fail_attempt(SessionState::AwaitingUserChoice, err)),
        }
    }

    /// Sign in through the federated identity provider.
    ///
    /// The provider steps stop with a `Cancelled` failure as soon as `cancel`
    /// fires; the final code exchange runs through the queue and is not
    /// cancellable.
    pub async fn authenticate_federated(
        &self,
        cancel: &CancellationToken,
    ) -> Result<AuthOutcome, AuthError> {
        let _attempt = self.begin(
            "sign in with the identity provider",
            &[
                SessionState::Unauthenticated,
                SessionState::AwaitingUserChoice,
                SessionState::Failed,
            ],
            SessionState::Authenticating,
        )?;

        let code = match self.obtain_authorization_code(cancel).await {
            Ok(code) => code,
            Err(err) => return Err(self.fail_attempt(SessionState::AwaitingUserChoice, err)),
        };

        match self.remote.exchange_federated_code(code).await {
            Ok(grant) => Ok(self.accept_grant(grant, LoginPath::Federated)),
            Err(err) => Err(self.fail_attempt(SessionState::AwaitingUserChoice, err)),
        }
    }

    async fn obtain_authorization_code(
        &self,
        cancel: &CancellationToken,
    ) -> Result<AuthorizationCode, RemoteError> {
        if !self.identity_provider.is_authenticated() {
            let status = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled_sign_in()),
                status = self.identity_provider.authenticate() => status,
            };
            match status.map_err(provider_error)? {
                SignInStatus::SignedIn => debug!("identity provider sign-in complete"),
                SignInStatus::Declined => {
                    return Err(RemoteError::unauthenticated(
                        "identity provider sign-in was declined",
                    ));
                }
            }
        }

        let code = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled_sign_in()),
            code = self.identity_provider.request_authorization_code(true) => code,
        };
        let code = code
            .map_err(provider_error)?
            .ok_or_else(|| {
                RemoteError::unauthenticated("identity provider returned no authorization code")
            })?;
        AuthorizationCode::new(code).map_err(|err| RemoteError::unauthenticated(err.to_string()))
    }

    fn accept_grant(&self, grant: AuthGrant, path: LoginPath) -> AuthOutcome {
        self.persist_credentials(&grant);

        let identity = grant.identity();
        let outcome = if identity.nickname().is_none() && self.policy.requires_nickname(path) {
            AuthOutcome::NicknameRequired(identity.clone())
        } else {
            AuthOutcome::Ready(identity.clone())
        };
        let next = match outcome {
            AuthOutcome::Ready(_) => SessionState::Ready,
            AuthOutcome::NicknameRequired(_) => SessionState::NicknameRequired,
        };

        let mut inner = self.lock();
        info!(
            %path,
            record_id = %identity.remote_record_id(),
            from = %inner.state,
            to = %next,
            "login succeeded"
        );
        inner.identity = Some(identity);
        inner.state = next;
        outcome
    }

    fn persist_credentials(&self, grant: &AuthGrant) {
        let previous = self.credentials.load().unwrap_or_else(|err| {
            warn!(error = %err, "credential cache unreadable; overwriting");
            Default::default()
        });
        if let Err(err) = self.credentials.save(&grant.merged_into(previous)) {
            warn!(error = %err, "failed to cache credentials; next launch needs a manual login");
        }
    }

    /// Set the account's nickname.
    ///
    /// Only allowed in `NicknameRequired`. The identity is updated and the
    /// session becomes ready only after the service confirms the change; a
    /// rejection leaves the state untouched.
    pub async fn submit_nickname(&self, raw: &str) -> Result<Identity, AuthError> {
        let (state, identity) = {
            let inner = self.lock();
            (inner.state, inner.identity.clone())
        };
        let identity = match (state, identity) {
            (SessionState::NicknameRequired, Some(identity)) => identity,
            (state, _) => {
                return Err(AuthError::InvalidState {
                    operation: "submit a nickname",
                    state,
                });
            }
        };
        let nickname = Nickname::new(raw)?;

        self.remote
            .update_nickname(identity.remote_record_id().clone(), nickname.clone())
            .await?;

        let updated = identity.with_nickname(nickname);
        let mut inner = self.lock();
        info!(record_id = %updated.remote_record_id(), "nickname accepted");
        inner.identity = Some(updated.clone());
        inner.state = SessionState::Ready;
        Ok(updated)
    }
}

impl IdentitySource for AuthSession {
    fn current_identity(&self) -> Option<Identity> {
        self.identity()
    }
}

fn cancelled_sign_in() -> RemoteError {
    RemoteError::cancelled("identity provider sign-in cancelled")
}

fn provider_error(err: IdentityProviderError) -> RemoteError {
    match err {
        IdentityProviderError::Unsupported => RemoteError::platform_unsupported(err.to_string()),
        IdentityProviderError::Failed { .. } => RemoteError::unauthenticated(err.to_string()),
    }
}

#[cfg(test)]
#[path = "auth_session_tests.rs"]
mod tests;
