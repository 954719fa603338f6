//! Remote-call error taxonomy.
//!
//! Failures are classified once, where they cross the remote boundary, and are
//! then carried as data through the queue, the services, and the login flow.
//! Nothing in the domain panics on a remote failure.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Signature the account service uses when a cached guest id is no longer
/// valid on its side.
pub const CORRUPT_IDENTITY_MARKER: &str = "bad customId";

/// Stable machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// The service could not be reached, timed out, or failed internally.
    NetworkFailure,
    /// Credentials were missing, expired, or rejected.
    Unauthenticated,
    /// The locally cached guest identity was rejected and must be discarded.
    CorruptLocalIdentity,
    /// The addressed record or table does not exist.
    RecordNotFound,
    /// The request was rejected as invalid (for example a duplicate nickname).
    ValidationFailure,
    /// The requested capability is not available on this platform.
    PlatformUnsupported,
    /// The operation was abandoned before it completed.
    Cancelled,
    /// Anything the classifier does not recognise.
    Unknown,
}

impl RemoteErrorKind {
    /// Snake-case identifier used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetworkFailure => "network_failure",
            Self::Unauthenticated => "unauthenticated",
            Self::CorruptLocalIdentity => "corrupt_local_identity",
            Self::RecordNotFound => "record_not_found",
            Self::ValidationFailure => "validation_failure",
            Self::PlatformUnsupported => "platform_unsupported",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    /// Classify an HTTP-like status code on its own.
    ///
    /// A status of `0` means no response was received at all.
    pub const fn from_status(status: u16) -> Self {
        match status {
            0 | 408 | 429 => Self::NetworkFailure,
            401 | 403 => Self::Unauthenticated,
            404 => Self::RecordNotFound,
            400 | 409 | 412 | 422 => Self::ValidationFailure,
            500..=599 => Self::NetworkFailure,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified remote failure.
///
/// ## Invariants
/// - `message` is never blank; a blank input is replaced by the kind name.
/// - `status_code` is `0` when no status was observed.
///
/// # Examples
/// ```
/// use client::domain::{RemoteError, RemoteErrorKind};
///
/// let err = RemoteError::classify(401, "bad customId (guest)");
/// assert_eq!(err.kind(), RemoteErrorKind::CorruptLocalIdentity);
/// assert_eq!(err.status_code(), 401);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    kind: RemoteErrorKind,
    message: String,
    status_code: u16,
}

impl RemoteError {
    /// Build an error of an explicit kind with no status code.
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            kind.as_str().to_owned()
        } else {
            message
        };
        Self {
            kind,
            message,
            status_code: 0,
        }
    }

    /// Classify a raw failure reported by the remote service.
    ///
    /// The corrupt-identity signature wins over the status code because the
    /// service reports it with ordinary client-error statuses.
    pub fn classify(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = if contains_corrupt_marker(&message) {
            RemoteErrorKind::CorruptLocalIdentity
        } else {
            RemoteErrorKind::from_status(status)
        };
        Self::new(kind, message).with_status(status)
    }

    /// Attach the observed status code.
    #[must_use]
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    /// Failure category.
    pub fn kind(&self) -> RemoteErrorKind {
        self.kind
    }

    /// Message as reported by the service or adapter.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Observed status code, `0` when none.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Convenience constructor for [`RemoteErrorKind::NetworkFailure`].
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::NetworkFailure, message)
    }

    /// Convenience constructor for [`RemoteErrorKind::Unauthenticated`].
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Unauthenticated, message)
    }

    /// Convenience constructor for [`RemoteErrorKind::CorruptLocalIdentity`].
    pub fn corrupt_local_identity(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::CorruptLocalIdentity, message)
    }

    /// Convenience constructor for [`RemoteErrorKind::RecordNotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::RecordNotFound, message)
    }

    /// Convenience constructor for [`RemoteErrorKind::ValidationFailure`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::ValidationFailure, message)
    }

    /// Convenience constructor for [`RemoteErrorKind::PlatformUnsupported`].
    pub fn platform_unsupported(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::PlatformUnsupported, message)
    }

    /// Convenience constructor for [`RemoteErrorKind::Cancelled`].
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Cancelled, message)
    }

    /// Convenience constructor for [`RemoteErrorKind::Unknown`].
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Unknown, message)
    }
}

fn contains_corrupt_marker(message: &str) -> bool {
    message
        .to_ascii_lowercase()
        .contains(&CORRUPT_IDENTITY_MARKER.to_ascii_lowercase())
}
