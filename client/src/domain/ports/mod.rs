//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod achievement_service;
mod credential_store;
mod identity_provider;
mod login_observer;
mod navigator;
mod remote_service;

#[cfg(test)]
pub use achievement_service::MockAchievementService;
pub use achievement_service::{AchievementError, AchievementService, NoOpAchievementService};
#[cfg(test)]
pub use credential_store::MockCredentialStore;
pub use credential_store::{CredentialStore, CredentialStoreError, InMemoryCredentialStore};
#[cfg(test)]
pub use identity_provider::MockIdentityProvider;
pub use identity_provider::{
    IdentityProvider, IdentityProviderError, SignInStatus, UnsupportedIdentityProvider,
};
#[cfg(test)]
pub use login_observer::MockLoginObserver;
pub use login_observer::{LoginObserver, TracingLoginObserver};
#[cfg(test)]
pub use navigator::MockNavigator;
pub use navigator::{Navigator, TracingNavigator};
#[cfg(test)]
pub use remote_service::MockRemoteService;
pub use remote_service::RemoteService;
