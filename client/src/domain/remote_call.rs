//! Remote operations as queueable values.

use std::fmt;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use super::ports::RemoteService;
use super::{
    AuthGrant, AuthorizationCode, GuestCredential, Nickname, Record, RecordId, RemoteError,
    RemoteRow, RowId, SessionToken,
};

/// Identifier of a remote operation, used for logging and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RemoteOperation {
    /// Session token login.
    AuthenticateAuto,
    /// Guest login.
    AuthenticateGuest,
    /// Federated authorization code exchange.
    ExchangeFederatedCode,
    /// Category row lookup.
    FetchRecord,
    /// Category row creation.
    InsertRecord,
    /// Category row overwrite.
    UpdateRecord,
    /// Nickname change.
    UpdateNickname,
}

impl RemoteOperation {
    /// Snake-case identifier used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthenticateAuto => "authenticate_auto",
            Self::AuthenticateGuest => "authenticate_guest",
            Self::ExchangeFederatedCode => "exchange_federated_code",
            Self::FetchRecord => "fetch_record",
            Self::InsertRecord => "insert_record",
            Self::UpdateRecord => "update_record",
            Self::UpdateNickname => "update_nickname",
        }
    }
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote operation with its owned arguments.
#[derive(Debug, Clone)]
pub enum RemoteCall {
    /// Log in with a cached session token.
    AuthenticateAuto {
        /// Cached token.
        token: SessionToken,
    },
    /// Log in as a guest.
    AuthenticateGuest {
        /// Cached guest id; `None` creates a new account.
        guest: Option<GuestCredential>,
    },
    /// Exchange a federated authorization code.
    ExchangeFederatedCode {
        /// One-time code from the identity provider.
        code: AuthorizationCode,
    },
    /// Read up to `limit` rows of a category.
    FetchRecord {
        /// Account owning the rows.
        owner: RecordId,
        /// Category name.
        category: &'static str,
        /// Maximum number of rows returned.
        limit: usize,
    },
    /// Create a category row.
    InsertRecord {
        /// Account owning the row.
        owner: RecordId,
        /// Category name.
        category: &'static str,
        /// Row fields.
        payload: Record,
    },
    /// Overwrite an existing category row.
    UpdateRecord {
        /// Account owning the row.
        owner: RecordId,
        /// Category name.
        category: &'static str,
        /// Row to overwrite.
        row_id: RowId,
        /// New row fields.
        payload: Record,
    },
    /// Change the account's nickname.
    UpdateNickname {
        /// Account to rename.
        owner: RecordId,
        /// Requested nickname.
        nickname: Nickname,
    },
}

/// Successful result of a dispatched call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutput {
    /// An authentication call succeeded.
    Granted(AuthGrant),
    /// A fetch returned these rows.
    Rows(Vec<RemoteRow>),
    /// An insert created this row.
    Inserted(RowId),
    /// A write completed with no payload.
    Acknowledged,
}

/// Completion value of a queued call.
pub type CallResult = Result<CallOutput, RemoteError>;

impl RemoteCall {
    /// Operation identifier.
    pub fn operation(&self) -> RemoteOperation {
        match self {
            Self::AuthenticateAuto { .. } => RemoteOperation::AuthenticateAuto,
            Self::AuthenticateGuest { .. } => RemoteOperation::AuthenticateGuest,
            Self::ExchangeFederatedCode { .. } => RemoteOperation::ExchangeFederatedCode,
            Self::FetchRecord { .. } => RemoteOperation::FetchRecord,
            Self::InsertRecord { .. } => RemoteOperation::InsertRecord,
            Self::UpdateRecord { .. } => RemoteOperation::UpdateRecord,
            Self::UpdateNickname { .. } => RemoteOperation::UpdateNickname,
        }
    }

    /// Category addressed by record operations.
    pub fn category(&self) -> Option<&'static str> {
        match self {
            Self::FetchRecord { category, .. }
            | Self::InsertRecord { category, .. }
            | Self::UpdateRecord { category, .. } => Some(*category),
            _ => None,
        }
    }

    /// Start the operation against `service`.
    ///
    /// The returned future owns everything it needs and makes progress only
    /// when polled.
    pub fn dispatch(self, service: Arc<dyn RemoteService>) -> BoxFuture<'static, CallResult> {
        async move {
            match self {
                Self::AuthenticateAuto { token } => service
                    .authenticate_auto(token)
                    .await
                    .map(CallOutput::Granted),
                Self::AuthenticateGuest { guest } => service
                    .authenticate_guest(guest)
                    .await
                    .map(CallOutput::Granted),
                Self::ExchangeFederatedCode { code } => service
                    .exchange_federated_code(code)
                    .await
                    .map(CallOutput::Granted),
                Self::FetchRecord {
                    owner,
                    category,
                    limit,
                } => service
                    .fetch_record(owner, category, limit)
                    .await
                    .map(CallOutput::Rows),
                Self::InsertRecord {
                    owner,
                    category,
                    payload,
                } => service
                    .insert_record(owner, category, payload)
                    .await
                    .map(CallOutput::Inserted),
                Self::UpdateRecord {
                    owner,
                    category,
                    row_id,
                    payload,
                } => service
                    .update_record(owner, category, row_id, payload)
                    .await
                    .map(|()| CallOutput::Acknowledged),
                Self::UpdateNickname { owner, nickname } => service
                    .update_nickname(owner, nickname)
                    .await
                    .map(|()| CallOutput::Acknowledged),
            }
        }
        .boxed()
    }
}
