//! Driven port for a federated identity provider.
//!
//! The provider's SDK is out of reach of this crate; the port only asks for
//! a sign-in and a one-time server-side authorisation code. Cancellation is
//! expressed by dropping the returned future.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors raised by identity provider adapters.
    pub enum IdentityProviderError {
        /// The provider is not available on this platform.
        Unsupported => "identity provider is not supported on this platform",
        /// The provider SDK reported a failure.
        Failed { message: String } => "identity provider failed: {message}",
    }
}

/// Outcome of an interactive sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInStatus {
    /// The player is signed in with the provider.
    SignedIn,
    /// The player dismissed or declined the sign-in.
    Declined,
}

/// Port for a federated identity provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Whether the provider already holds a signed-in player.
    fn is_authenticated(&self) -> bool;

    /// Run the provider's sign-in flow.
    async fn authenticate(&self) -> Result<SignInStatus, IdentityProviderError>;

    /// Request a server-side authorisation code.
    ///
    /// Returns `Ok(None)` when the provider produced no code.
    async fn request_authorization_code(
        &self,
        force_refresh: bool,
    ) -> Result<Option<String>, IdentityProviderError>;
}

/// Provider used on platforms without federated sign-in.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedIdentityProvider;

#[async_trait]
impl IdentityProvider for UnsupportedIdentityProvider {
    fn is_authenticated(&self) -> bool {
        false
    }

    async fn authenticate(&self) -> Result<SignInStatus, IdentityProviderError> {
        Err(IdentityProviderError::unsupported())
    }

    async fn request_authorization_code(
        &self,
        _force_refresh: bool,
    ) -> Result<Option<String>, IdentityProviderError> {
        Err(IdentityProviderError::unsupported())
    }
}
