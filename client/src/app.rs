//! Composition root wiring adapters, services and lifecycle hooks.
//!
//! [`SessionAppBuilder`] collects the port implementations; anything not
//! supplied falls back to a logging or unsupported fixture, except the remote
//! service and credential store which must be provided. [`SessionApp`] owns
//! the single [`RemoteCallQueue`] shared by every service.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::{ClientSettings, SettingsError};
use crate::domain::ports::{
    AchievementService, CredentialStore, CredentialStoreError, IdentityProvider, LoginObserver,
    Navigator, NoOpAchievementService, RemoteService, TracingLoginObserver, TracingNavigator,
    UnsupportedIdentityProvider,
};
use crate::domain::{
    AuthSession, CategoryDescriptor, DataSyncService, LoginOrchestrator, NicknamePolicy,
    QueuedRemote, RemoteCallQueue,
};
use crate::inbound::lifecycle::LifecycleHooks;
use crate::outbound::credentials::FileCredentialStore;
use crate::outbound::http::HttpRemoteService;
use crate::outbound::memory::InMemoryRemoteService;

/// Errors raised while assembling the client.
#[derive(Debug, Error)]
pub enum AppBuildError {
    /// The settings failed validation.
    #[error(transparent)]
    Settings(#[from] SettingsError),
    /// The HTTP client could not be created.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    /// The credential directory could not be opened.
    #[error(transparent)]
    Credentials(#[from] CredentialStoreError),
    /// No remote service was supplied.
    #[error("a remote service adapter is required")]
    MissingRemote,
    /// No credential store was supplied.
    #[error("a credential store adapter is required")]
    MissingCredentialStore,
}

/// Builder-style wiring for [`SessionApp`].
#[must_use]
pub struct SessionAppBuilder {
    remote: Option<Arc<dyn RemoteService>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    identity_provider: Arc<dyn IdentityProvider>,
    achievements: Arc<dyn AchievementService>,
    navigator: Arc<dyn Navigator>,
    observer: Arc<dyn LoginObserver>,
    policy: NicknamePolicy,
    categories: Option<Vec<&'static dyn CategoryDescriptor>>,
}

impl Default for SessionAppBuilder {
    fn default() -> Self {
        Self {
            remote: None,
            credentials: None,
            identity_provider: Arc::new(UnsupportedIdentityProvider),
            achievements: Arc::new(NoOpAchievementService),
            navigator: Arc::new(TracingNavigator),
            observer: Arc::new(TracingLoginObserver),
            policy: NicknamePolicy::default(),
            categories: None,
        }
    }
}

impl SessionAppBuilder {
    /// Empty builder with fixture adapters for the optional ports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder configured from validated settings.
    ///
    /// Offline mode uses [`InMemoryRemoteService`]; otherwise the HTTP adapter
    /// targets `backend_url`. Credentials are cached in `credentials_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`AppBuildError`] when validation fails or an adapter cannot
    /// be created.
    pub fn from_settings(settings: &ClientSettings) -> Result<Self, AppBuildError> {
        settings.validate()?;
        let remote: Arc<dyn RemoteService> = if settings.offline {
            info!("using in-process remote service");
            Arc::new(InMemoryRemoteService::new())
        } else {
            let url = settings.backend_url()?;
            info!(backend_url = %url, "using HTTP remote service");
            Arc::new(HttpRemoteService::new(url, settings.request_timeout())?)
        };
        let credentials = FileCredentialStore::open(settings.credentials_dir())?;
        let policy = NicknamePolicy {
            token: settings.check_nickname_on_token_login,
            ..NicknamePolicy::default()
        };
        Ok(Self::new()
            .remote(remote)
            .credentials(Arc::new(credentials))
            .nickname_policy(policy))
    }

    /// Remote service adapter.
    pub fn remote(mut self, remote: Arc<dyn RemoteService>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Credential cache adapter.
    pub fn credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Federated identity provider.
    pub fn identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity_provider = provider;
        self
    }

    /// Platform achievement service.
    pub fn achievements(mut self, achievements: Arc<dyn AchievementService>) -> Self {
        self.achievements = achievements;
        self
    }

    /// Screen navigator.
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    /// Login screen observer.
    pub fn observer(mut self, observer: Arc<dyn LoginObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Per-path nickname policy.
    pub fn nickname_policy(mut self, policy: NicknamePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Categories loaded after login, replacing the game catalog.
    pub fn categories(mut self, categories: Vec<&'static dyn CategoryDescriptor>) -> Self {
        self.categories = Some(categories);
        self
    }

    /// Assemble the client.
    ///
    /// # Errors
    ///
    /// Returns [`AppBuildError::MissingRemote`] or
    /// [`AppBuildError::MissingCredentialStore`] when a required adapter was
    /// not supplied.
    pub fn build(self) -> Result<SessionApp, AppBuildError> {
        let remote = self.remote.ok_or(AppBuildError::MissingRemote)?;
        let credentials = self
            .credentials
            .ok_or(AppBuildError::MissingCredentialStore)?;

        let queue = Arc::new(RemoteCallQueue::new(remote));
        let queued = QueuedRemote::new(Arc::clone(&queue));
        let session = Arc::new(AuthSession::new(
            queued.clone(),
            credentials,
            self.identity_provider,
            self.policy,
        ));
        let data = DataSyncService::new(queued, session.clone());
        let mut orchestrator = LoginOrchestrator::new(
            session,
            data,
            self.achievements,
            self.navigator,
            self.observer,
        );
        if let Some(categories) = self.categories {
            orchestrator = orchestrator.with_categories(categories);
        }
        Ok(SessionApp {
            hooks: LifecycleHooks::new(Arc::clone(&queue)),
            queue,
            orchestrator: Arc::new(orchestrator),
        })
    }
}

/// A fully wired client session.
pub struct SessionApp {
    queue: Arc<RemoteCallQueue>,
    orchestrator: Arc<LoginOrchestrator>,
    hooks: LifecycleHooks,
}

impl SessionApp {
    /// The queue the host must tick once per frame.
    pub fn queue(&self) -> &Arc<RemoteCallQueue> {
        &self.queue
    }

    /// Login flow entry points.
    pub fn orchestrator(&self) -> &Arc<LoginOrchestrator> {
        &self.orchestrator
    }

    /// Host lifecycle hooks.
    pub fn lifecycle(&self) -> &LifecycleHooks {
        &self.hooks
    }
}
