//! Typed facade over the remote call queue.
//!
//! Wraps enqueue, await and output matching so services call typed methods
//! and never see [`CallOutput`] or the remote service itself.

use std::sync::Arc;

use super::call_queue::RemoteCallQueue;
use super::remote_call::{CallOutput, RemoteCall, RemoteOperation};
use super::{
    AuthGrant, AuthorizationCode, GuestCredential, Nickname, Record, RecordId, RemoteError,
    RemoteRow, RowId, SessionToken,
};

/// Remote operations routed through a [`RemoteCallQueue`].
#[derive(Clone)]
pub struct QueuedRemote {
    queue: Arc<RemoteCallQueue>,
}

impl QueuedRemote {
    /// Wrap a shared queue.
    pub fn new(queue: Arc<RemoteCallQueue>) -> Self {
        Self { queue }
    }

    /// The underlying queue.
    pub fn queue(&self) -> &Arc<RemoteCallQueue> {
        &self.queue
    }

    async fn call(&self, call: RemoteCall) -> Result<CallOutput, RemoteError> {
        self.queue.enqueue(call).await
    }

    async fn grant(&self, call: RemoteCall) -> Result<AuthGrant, RemoteError> {
        let operation = call.operation();
        match self.call(call).await? {
            CallOutput::Granted(grant) => Ok(grant),
            other => Err(unexpected_output(operation, &other)),
        }
    }

    async fn acknowledge(&self, call: RemoteCall) -> Result<(), RemoteError> {
        let operation = call.operation();
        match self.call(call).await? {
            CallOutput::Acknowledged => Ok(()),
            other => Err(unexpected_output(operation, &other)),
        }
    }

    /// Queued [`RemoteService::authenticate_auto`](super::ports::RemoteService::authenticate_auto).
    pub async fn authenticate_auto(&self, token: SessionToken) -> Result<AuthGrant, RemoteError> {
        self.grant(RemoteCall::AuthenticateAuto { token }).await
    }

    /// Queued guest authentication.
    pub async fn authenticate_guest(
        &self,
        guest: Option<GuestCredential>,
    ) -> Result<AuthGrant, RemoteError> {
        self.grant(RemoteCall::AuthenticateGuest { guest }).await
    }

    /// Queued federated code exchange.
    pub async fn exchange_federated_code(
        &self,
        code: AuthorizationCode,
    ) -> Result<AuthGrant, RemoteError> {
        self.grant(RemoteCall::ExchangeFederatedCode { code }).await
    }

    /// Queued record fetch.
    pub async fn fetch_record(
        &self,
        owner: RecordId,
        category: &'static str,
        limit: usize,
    ) -> Result<Vec<RemoteRow>, RemoteError> {
        let call = RemoteCall::FetchRecord {
            owner,
            category,
            limit,
        };
        match self.call(call).await? {
            CallOutput::Rows(rows) => Ok(rows),
            other => Err(unexpected_output(RemoteOperation::FetchRecord, &other)),
        }
    }

    /// Queued record insert.
    pub async fn insert_record(
        &self,
        owner: RecordId,
        category: &'static str,
        payload: Record,
    ) -> Result<RowId, RemoteError> {
        let call = RemoteCall::InsertRecord {
            owner,
            category,
            payload,
        };
        match self.call(call).await? {
            CallOutput::Inserted(row_id) => Ok(row_id),
            other => Err(unexpected_output(RemoteOperation::InsertRecord, &other)),
        }
    }

    /// Queued record update.
    pub async fn update_record(
        &self,
        owner: RecordId,
        category: &'static str,
        row_id: RowId,
        payload: Record,
    ) -> Result<(), RemoteError> {
        self.acknowledge(RemoteCall::UpdateRecord {
            owner,
            category,
            row_id,
            payload,
        })
        .await
    }

    /// Queued nickname update.
    pub async fn update_nickname(
        &self,
        owner: RecordId,
        nickname: Nickname,
    ) -> Result<(), RemoteError> {
        self.acknowledge(RemoteCall::UpdateNickname { owner, nickname })
            .await
    }
}

fn unexpected_output(operation: RemoteOperation, output: &CallOutput) -> RemoteError {
    RemoteError::unknown(format!(
        "{operation} completed with an unexpected result: {output:?}"
    ))
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::RemoteErrorKind;
    use crate::domain::ports::MockRemoteService;

    #[test]
    fn typed_fetch_unwraps_rows() {
        let mut service = MockRemoteService::new();
        service
            .expect_fetch_record()
            .withf(|owner, category, limit| {
                owner.as_ref() == "row-1" && category == "stage" && *limit == 1
            })
            .times(1)
            .return_once(|_, _, _| Ok(Vec::new()));
        let queue = Arc::new(RemoteCallQueue::new(Arc::new(service)));
        let remote = QueuedRemote::new(Arc::clone(&queue));

        let rows = queue
            .drive(
                remote.fetch_record(RecordId::new("row-1").expect("id"), "stage", 1),
                4,
            )
            .expect("completes")
            .expect("fetch succeeds");

        assert!(rows.is_empty());
    }

    #[test]
    fn remote_failures_pass_through_unchanged() {
        let mut service = MockRemoteService::new();
        service
            .expect_update_nickname()
            .times(1)
            .return_once(|_, _| Err(RemoteError::classify(409, "duplicated nickname")));
        let queue = Arc::new(RemoteCallQueue::new(Arc::new(service)));
        let remote = QueuedRemote::new(Arc::clone(&queue));

        let err = queue
            .drive(
                remote.update_nickname(
                    RecordId::new("row-1").expect("id"),
                    Nickname::new("Ada").expect("nickname"),
                ),
                4,
            )
            .expect("completes")
            .expect_err("rejected");

        assert_eq!(err.kind(), RemoteErrorKind::ValidationFailure);
        assert_eq!(err.status_code(), 409);
    }
}
