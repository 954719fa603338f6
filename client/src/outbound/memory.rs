//! In-process remote service.
//!
//! Keeps accounts and category rows in memory. Used by the offline mode of
//! the binary and by tests, which can inject failures, add per-call latency
//! measured in polls, and inspect call counts.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::RemoteService;
use crate::domain::{
    AuthGrant, AuthorizationCode, GuestCredential, Nickname, Record, RecordId, RemoteError,
    RemoteOperation, RemoteRow, RowId, SessionToken,
};

/// Credentials of an account created through
/// [`InMemoryRemoteService::create_guest_account`].
#[derive(Debug, Clone)]
pub struct SeededAccount {
    /// Account record id.
    pub record_id: RecordId,
    /// Guest id for guest login.
    pub guest: GuestCredential,
    /// Live session token for automatic login.
    pub token: SessionToken,
}

#[derive(Debug, Clone)]
struct Account {
    record_id: RecordId,
    nickname: Option<Nickname>,
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<RecordId, Account>,
    guests: HashMap<String, RecordId>,
    federated: HashMap<String, RecordId>,
    sessions: HashMap<String, RecordId>,
    reserved_nicknames: HashSet<String>,
    tables: HashMap<(RecordId, &'static str), Vec<RemoteRow>>,
    one_shot_failures: HashMap<RemoteOperation, VecDeque<RemoteError>>,
    category_failures: HashMap<(RemoteOperation, &'static str), RemoteError>,
    calls: BTreeMap<RemoteOperation, usize>,
    next_id: u64,
}

impl MemoryState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn record_call(
        &mut self,
        operation: RemoteOperation,
        category: Option<&'static str>,
    ) -> Result<(), RemoteError> {
        *self.calls.entry(operation).or_default() += 1;
        if let Some(err) = category
            .and_then(|name| self.category_failures.get(&(operation, name)))
            .cloned()
        {
            return Err(err);
        }
        match self
            .one_shot_failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn create_account(&mut self, nickname: Option<Nickname>) -> RecordId {
        let raw = self.next_id("account");
        let record_id = RecordId::new(raw)
            .unwrap_or_else(|error| panic!("generated record id was rejected: {error}"));
        if let Some(name) = &nickname {
            self.reserved_nicknames.insert(name.as_ref().to_owned());
        }
        self.accounts.insert(
            record_id.clone(),
            Account {
                record_id: record_id.clone(),
                nickname,
            },
        );
        record_id
    }

    fn issue_grant(
        &mut self,
        record_id: &RecordId,
        guest: Option<GuestCredential>,
    ) -> Result<AuthGrant, RemoteError> {
        let account = self
            .accounts
            .get(record_id)
            .cloned()
            .ok_or_else(|| RemoteError::classify(404, "account not found"))?;
        let token = Uuid::new_v4().to_string();
        self.sessions.insert(token.clone(), record_id.clone());
        Ok(AuthGrant {
            record_id: account.record_id,
            nickname: account.nickname,
            session_token: SessionToken::new(token)
                .map_err(|err| RemoteError::unknown(err.to_string()))?,
            guest_credential: guest,
        })
    }

    fn new_guest(&mut self) -> Result<(RecordId, GuestCredential), RemoteError> {
        let record_id = self.create_account(None);
        let guest_id = Uuid::new_v4().to_string();
        self.guests.insert(guest_id.clone(), record_id.clone());
        let guest =
            GuestCredential::new(guest_id).map_err(|err| RemoteError::unknown(err.to_string()))?;
        Ok((record_id, guest))
    }
}

/// Remote service backed by process memory.
#[derive(Default)]
pub struct InMemoryRemoteService {
    state: Mutex<MemoryState>,
    latency_polls: usize,
}

impl InMemoryRemoteService {
    /// Empty service answering every call on its first poll.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call stay pending for `polls` polls before answering.
    #[must_use]
    pub fn with_latency(mut self, polls: usize) -> Self {
        self.latency_polls = polls;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn respond<T>(
        &self,
        operation: RemoteOperation,
        category: Option<&'static str>,
        handler: impl FnOnce(&mut MemoryState) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        Latency::new(self.latency_polls).await;
        let mut state = self.lock();
        state.record_call(operation, category)?;
        let result = handler(&mut state);
        debug!(%operation, category, ok = result.is_ok(), "in-memory remote call");
        result
    }

    /// Create a guest account and a live session for it.
    pub fn create_guest_account(&self, nickname: Option<&str>) -> SeededAccount {
        let nickname = nickname.and_then(|raw| Nickname::new(raw).ok());
        let mut state = self.lock();
        let record_id = state.create_account(nickname);
        let guest_id = Uuid::new_v4().to_string();
        state.guests.insert(guest_id.clone(), record_id.clone());
        let token = Uuid::new_v4().to_string();
        state.sessions.insert(token.clone(), record_id.clone());
        SeededAccount {
            record_id,
            guest: GuestCredential::new(guest_id)
                .unwrap_or_else(|error| panic!("generated guest id was rejected: {error}")),
            token: SessionToken::new(token)
                .unwrap_or_else(|error| panic!("generated session token was rejected: {error}")),
        }
    }

    /// Invalidate a session token.
    pub fn revoke_session(&self, token: &SessionToken) {
        self.lock().sessions.remove(token.expose());
    }

    /// Mark a nickname as already taken.
    pub fn reserve_nickname(&self, nickname: &str) {
        self.lock()
            .reserved_nicknames
            .insert(nickname.trim().to_owned());
    }

    /// Fail the next call of `operation` with `error`.
    ///
    /// Repeated injections queue up and are consumed in order.
    pub fn fail_next(&self, operation: RemoteOperation, error: RemoteError) {
        self.lock()
            .one_shot_failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Fail every call of `operation` addressing `category` with `error`.
    pub fn fail_category(
        &self,
        operation: RemoteOperation,
        category: &'static str,
        error: RemoteError,
    ) {
        self.lock()
            .category_failures
            .insert((operation, category), error);
    }

    /// Store a row directly, bypassing call accounting.
    pub fn seed_row(&self, owner: &RecordId, category: &'static str, fields: Record) -> RowId {
        let mut state = self.lock();
        let row_id = RowId::new(state.next_id("row"));
        state
            .tables
            .entry((owner.clone(), category))
            .or_default()
            .push(RemoteRow {
                row_id: row_id.clone(),
                fields,
            });
        row_id
    }

    /// Rows stored for `owner` in `category`.
    pub fn rows(&self, owner: &RecordId, category: &'static str) -> Vec<RemoteRow> {
        self.lock()
            .tables
            .get(&(owner.clone(), category))
            .cloned()
            .unwrap_or_default()
    }

    /// Nickname currently stored on the account.
    pub fn nickname_of(&self, owner: &RecordId) -> Option<Nickname> {
        self.lock()
            .accounts
            .get(owner)
            .and_then(|account| account.nickname.clone())
    }

    /// Number of calls of `operation` received so far.
    pub fn call_count(&self, operation: RemoteOperation) -> usize {
        self.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Number of calls of any operation received so far.
    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }
}

#[async_trait]
impl RemoteService for InMemoryRemoteService {
    async fn authenticate_auto(&self, token: SessionToken) -> Result<AuthGrant, RemoteError> {
        self.respond(RemoteOperation::AuthenticateAuto, None, |state| {
            let record_id = state
                .sessions
                .remove(token.expose())
                .ok_or_else(|| RemoteError::classify(401, "session token expired or unknown"))?;
            state.issue_grant(&record_id, None)
        })
        .await
    }

    async fn authenticate_guest(
        &self,
        guest: Option<GuestCredential>,
    ) -> Result<AuthGrant, RemoteError> {
        self.respond(RemoteOperation::AuthenticateGuest, None, |state| {
            let (record_id, guest) = match guest {
                Some(guest) => {
                    let record_id = state.guests.get(guest.expose()).cloned().ok_or_else(|| {
                        RemoteError::classify(401, "bad customId: guest account unknown")
                    })?;
                    (record_id, guest)
                }
                None => state.new_guest()?,
            };
            state.issue_grant(&record_id, Some(guest))
        })
        .await
    }

    async fn exchange_federated_code(
        &self,
        code: AuthorizationCode,
    ) -> Result<AuthGrant, RemoteError> {
        self.respond(RemoteOperation::ExchangeFederatedCode, None, |state| {
            let record_id = match state.federated.get(code.expose()).cloned() {
                Some(record_id) => record_id,
                None => {
                    let record_id = state.create_account(None);
                    state
                        .federated
                        .insert(code.expose().to_owned(), record_id.clone());
                    record_id
                }
            };
            state.issue_grant(&record_id, None)
        })
        .await
    }

    async fn fetch_record(
        &self,
        owner: RecordId,
        category: &'static str,
        limit: usize,
    ) -> Result<Vec<RemoteRow>, RemoteError> {
        self.respond(RemoteOperation::FetchRecord, Some(category), |state| {
            Ok(state
                .tables
                .get(&(owner, category))
                .map(|rows| rows.iter().take(limit).cloned().collect())
                .unwrap_or_default())
        })
        .await
    }

    async fn insert_record(
        &self,
        owner: RecordId,
        category: &'static str,
        payload: Record,
    ) -> Result<RowId, RemoteError> {
        self.respond(RemoteOperation::InsertRecord, Some(category), |state| {
            let row_id = RowId::new(state.next_id("row"));
            state
                .tables
                .entry((owner, category))
                .or_default()
                .push(RemoteRow {
                    row_id: row_id.clone(),
                    fields: payload,
                });
            Ok(row_id)
        })
        .await
    }

    async fn update_record(
        &self,
        owner: RecordId,
        category: &'static str,
        row_id: RowId,
        payload: Record,
    ) -> Result<(), RemoteError> {
        self.respond(RemoteOperation::UpdateRecord, Some(category), |state| {
            let row = state
                .tables
                .get_mut(&(owner, category))
                .and_then(|rows| rows.iter_mut().find(|row| row.row_id == row_id))
                .ok_or_else(|| RemoteError::classify(404, format!("row {row_id} not found")))?;
            row.fields = payload;
            Ok(())
        })
        .await
    }

    async fn update_nickname(
        &self,
        owner: RecordId,
        nickname: Nickname,
    ) -> Result<(), RemoteError> {
        self.respond(RemoteOperation::UpdateNickname, None, |state| {
            let current = state
                .accounts
                .get(&owner)
                .ok_or_else(|| RemoteError::classify(404, "account not found"))?
                .nickname
                .clone();
            if current.as_ref() != Some(&nickname)
                && state.reserved_nicknames.contains(nickname.as_ref())
            {
                return Err(RemoteError::classify(409, "duplicated nickname"));
            }
            if let Some(previous) = current {
                state.reserved_nicknames.remove(previous.as_ref());
            }
            state
                .reserved_nicknames
                .insert(nickname.as_ref().to_owned());
            if let Some(account) = state.accounts.get_mut(&owner) {
                account.nickname = Some(nickname);
            }
            Ok(())
        })
        .await
    }
}

/// Future that stays pending for a fixed number of polls.
struct Latency {
    remaining: usize,
}

impl Latency {
    fn new(polls: usize) -> Self {
        Self { remaining: polls }
    }
}

impl Future for Latency {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.remaining == 0 {
            return Poll::Ready(());
        }
        self.remaining -= 1;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
