//! Driven port for the remote account and game-data service.
//!
//! Every method maps to one primitive remote operation. Adapters classify
//! their failures with [`RemoteError::classify`] so callers only ever see the
//! shared taxonomy. Callers reach this port through the remote call queue,
//! never directly.

use async_trait::async_trait;

use crate::domain::{
    AuthGrant, AuthorizationCode, GuestCredential, Nickname, Record, RecordId, RemoteError,
    RemoteRow, RowId, SessionToken,
};

/// Port for the remote service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Sign in with a previously issued session token.
    async fn authenticate_auto(&self, token: SessionToken) -> Result<AuthGrant, RemoteError>;

    /// Sign in as a guest.
    ///
    /// Without a cached guest id the service creates a new guest account and
    /// returns its id in the grant.
    async fn authenticate_guest(
        &self,
        guest: Option<GuestCredential>,
    ) -> Result<AuthGrant, RemoteError>;

    /// Exchange a federated provider's authorisation code for a session.
    async fn exchange_federated_code(
        &self,
        code: AuthorizationCode,
    ) -> Result<AuthGrant, RemoteError>;

    /// Fetch at most `limit` rows owned by `owner` from `category`.
    async fn fetch_record(
        &self,
        owner: RecordId,
        category: &'static str,
        limit: usize,
    ) -> Result<Vec<RemoteRow>, RemoteError>;

    /// Insert a row and return its id.
    async fn insert_record(
        &self,
        owner: RecordId,
        category: &'static str,
        payload: Record,
    ) -> Result<RowId, RemoteError>;

    /// Replace the fields of an existing row.
    async fn update_record(
        &self,
        owner: RecordId,
        category: &'static str,
        row_id: RowId,
        payload: Record,
    ) -> Result<(), RemoteError>;

    /// Set the account's public nickname.
    ///
    /// Duplicates are rejected with a validation failure.
    async fn update_nickname(&self, owner: RecordId, nickname: Nickname)
    -> Result<(), RemoteError>;
}
