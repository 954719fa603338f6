//! Authentication primitives: cached credentials and grants.
//!
//! Secrets are held in [`Zeroizing`] buffers and never printed by `Debug`.

use std::fmt;

use zeroize::Zeroizing;

use super::{Identity, Nickname, RecordId};

/// Error returned when a credential value is blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialValidationError {
    /// Guest account id was blank.
    EmptyGuestCredential,
    /// Session token was blank.
    EmptySessionToken,
    /// Provider authorisation code was blank.
    EmptyAuthorizationCode,
}

impl fmt::Display for CredentialValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyGuestCredential => write!(f, "guest credential must not be empty"),
            Self::EmptySessionToken => write!(f, "session token must not be empty"),
            Self::EmptyAuthorizationCode => write!(f, "authorization code must not be empty"),
        }
    }
}

impl std::error::Error for CredentialValidationError {}

fn non_blank(
    raw: impl Into<String>,
    err: CredentialValidationError,
) -> Result<Zeroizing<String>, CredentialValidationError> {
    let raw = Zeroizing::new(raw.into());
    if raw.trim().is_empty() {
        return Err(err);
    }
    Ok(raw)
}

macro_rules! secret_newtype {
    ($(#[$meta:meta])* $name:ident, $err:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(Zeroizing<String>);

        impl $name {
            /// Validate and wrap a secret value.
            pub fn new(raw: impl Into<String>) -> Result<Self, CredentialValidationError> {
                non_blank(raw, CredentialValidationError::$err).map(Self)
            }

            /// Expose the secret for transmission or persistence.
            pub fn expose(&self) -> &str {
                self.0.as_str()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&"<redacted>").finish()
            }
        }
    };
}

secret_newtype!(
    /// Guest account id issued by the account service and cached locally so
    /// the same guest account is reused on the next launch.
    GuestCredential,
    EmptyGuestCredential
);

secret_newtype!(
    /// Session token used for automatic login.
    SessionToken,
    EmptySessionToken
);

secret_newtype!(
    /// One-time server-side authorisation code obtained from a federated
    /// identity provider.
    AuthorizationCode,
    EmptyAuthorizationCode
);

/// Result of a successful authentication call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    /// Remote account record id.
    pub record_id: RecordId,
    /// Nickname already on the account, if any.
    pub nickname: Option<Nickname>,
    /// Fresh session token for later automatic logins.
    pub session_token: SessionToken,
    /// Guest account id, present for guest accounts.
    pub guest_credential: Option<GuestCredential>,
}

impl AuthGrant {
    /// Identity described by this grant.
    pub fn identity(&self) -> Identity {
        Identity::new(self.record_id.clone(), self.nickname.clone())
    }

    /// Credentials worth caching after this grant.
    ///
    /// A grant without a guest id keeps whichever guest id was cached before.
    pub fn merged_into(&self, previous: StoredCredentials) -> StoredCredentials {
        StoredCredentials {
            guest: self.guest_credential.clone().or(previous.guest),
            session_token: Some(self.session_token.clone()),
        }
    }
}

/// Locally cached credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredCredentials {
    /// Cached guest account id.
    pub guest: Option<GuestCredential>,
    /// Cached session token.
    pub session_token: Option<SessionToken>,
}

impl StoredCredentials {
    /// `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.guest.is_none() && self.session_token.is_none()
    }
}
