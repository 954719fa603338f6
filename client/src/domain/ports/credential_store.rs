//! Driven port for the locally cached credentials.
//!
//! The interface is synchronous: the cache is a small local file read once
//! per login attempt.

use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::StoredCredentials;

use super::define_port_error;

define_port_error! {
    /// Errors raised by credential store adapters.
    pub enum CredentialStoreError {
        /// Reading or writing the store failed.
        Io { message: String } => "credential store i/o failed: {message}",
        /// The stored contents could not be parsed.
        Corrupt { message: String } => "credential store contents are corrupt: {message}",
    }
}

/// Port for the credential cache.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore: Send + Sync {
    /// Load cached credentials; an absent cache loads as empty.
    fn load(&self) -> Result<StoredCredentials, CredentialStoreError>;

    /// Replace the cached credentials.
    fn save(&self, credentials: &StoredCredentials) -> Result<(), CredentialStoreError>;

    /// Remove every cached credential.
    fn clear(&self) -> Result<(), CredentialStoreError>;
}

/// Process-local credential store.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credentials: Mutex<StoredCredentials>,
    clears: AtomicUsize,
}

impl InMemoryCredentialStore {
    /// Store pre-seeded with `credentials`.
    pub fn with_credentials(credentials: StoredCredentials) -> Self {
        Self {
            credentials: Mutex::new(credentials),
            clears: AtomicUsize::new(0),
        }
    }

    /// Number of times [`CredentialStore::clear`] was called.
    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    /// Current contents.
    pub fn snapshot(&self) -> StoredCredentials {
        self.credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn load(&self) -> Result<StoredCredentials, CredentialStoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, credentials: &StoredCredentials) -> Result<(), CredentialStoreError> {
        *self
            .credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = credentials.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialStoreError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self
            .credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = StoredCredentials::default();
        Ok(())
    }
}
