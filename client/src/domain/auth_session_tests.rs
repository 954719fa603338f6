//! Tests for the session state machine.

use super::*;
use crate::domain::ports::{
    InMemoryCredentialStore, MockCredentialStore, MockIdentityProvider,
    UnsupportedIdentityProvider,
};
use crate::domain::remote_call::RemoteOperation;
use crate::domain::{GuestCredential, RemoteCallQueue, StoredCredentials};
use crate::outbound::memory::InMemoryRemoteService;
use rstest::rstest;

const TICKS: usize = 64;

struct Harness {
    remote: Arc<InMemoryRemoteService>,
    queue: Arc<RemoteCallQueue>,
    credentials: Arc<InMemoryCredentialStore>,
    session: AuthSession,
}

fn build(
    remote: Arc<InMemoryRemoteService>,
    stored: StoredCredentials,
    provider: Arc<dyn IdentityProvider>,
    policy: NicknamePolicy,
) -> Harness {
    let queue = Arc::new(RemoteCallQueue::new(remote.clone()));
    let credentials = Arc::new(InMemoryCredentialStore::with_credentials(stored));
    let session = AuthSession::new(
        QueuedRemote::new(Arc::clone(&queue)),
        credentials.clone(),
        provider,
        policy,
    );
    Harness {
        remote,
        queue,
        credentials,
        session,
    }
}

fn default_harness(remote: Arc<InMemoryRemoteService>, stored: StoredCredentials) -> Harness {
    build(
        remote,
        stored,
        Arc::new(UnsupportedIdentityProvider),
        NicknamePolicy::default(),
    )
}

#[test]
fn auto_login_without_token_fails_without_remote_call() {
    let h = default_harness(
        Arc::new(InMemoryRemoteService::new()),
        StoredCredentials::default(),
    );

    let err = h
        .queue
        .drive(h.session.authenticate_auto(), TICKS)
        .expect("completes")
        .expect_err("no token");

    assert_eq!(err.remote_kind(), Some(RemoteErrorKind::Unauthenticated));
    assert_eq!(h.session.state(), SessionState::AwaitingUserChoice);
    assert_eq!(h.remote.total_calls(), 0);
    assert!(h.session.identity().is_none());
}

#[rstest]
#[case(NicknamePolicy::default(), SessionState::Ready)]
#[case(NicknamePolicy { token: true, ..NicknamePolicy::default() }, SessionState::NicknameRequired)]
fn auto_login_applies_token_policy(
    #[case] policy: NicknamePolicy,
    #[case] expected: SessionState,
) {
    let remote = Arc::new(InMemoryRemoteService::new());
    let account = remote.create_guest_account(None);
    let h = build(
        remote,
        StoredCredentials {
            guest: Some(account.guest.clone()),
            session_token: Some(account.token.clone()),
        },
        Arc::new(UnsupportedIdentityProvider),
        policy,
    );

    let outcome = h
        .queue
        .drive(h.session.authenticate_auto(), TICKS)
        .expect("completes")
        .expect("token accepted");

    assert_eq!(outcome.identity().remote_record_id(), &account.record_id);
    assert_eq!(h.session.state(), expected);
}

#[test]
fn rejected_token_awaits_user_choice() {
    let remote = Arc::new(InMemoryRemoteService::new());
    let account = remote.create_guest_account(Some("Ada"));
    remote.revoke_session(&account.token);
    let h = default_harness(
        remote,
        StoredCredentials {
            guest: None,
            session_token: Some(account.token),
        },
    );

    let err = h
        .queue
        .drive(h.session.authenticate_auto(), TICKS)
        .expect("completes")
        .expect_err("revoked");

    assert_eq!(err.remote_kind(), Some(RemoteErrorKind::Unauthenticated));
    assert_eq!(h.session.state(), SessionState::AwaitingUserChoice);
}

#[test]
fn fresh_guest_requires_nickname_and_caches_credentials() {
    let h = default_harness(
        Arc::new(InMemoryRemoteService::new()),
        StoredCredentials::default(),
    );

    let outcome = h
        .queue
        .drive(h.session.authenticate_guest(), TICKS)
        .expect("completes")
        .expect("guest created");

    assert!(matches!(outcome, AuthOutcome::NicknameRequired(_)));
    assert_eq!(h.session.state(), SessionState::NicknameRequired);
    let cached = h.credentials.snapshot();
    assert!(cached.guest.is_some());
    assert!(cached.session_token.is_some());
}

#[test]
fn known_guest_with_nickname_is_ready() {
    let remote = Arc::new(InMemoryRemoteService::new());
    let account = remote.create_guest_account(Some("Ada"));
    let h = default_harness(
        remote,
        StoredCredentials {
            guest: Some(account.guest),
            session_token: None,
        },
    );

    let outcome = h
        .queue
        .drive(h.session.authenticate_guest(), TICKS)
        .expect("completes")
        .expect("guest accepted");

    assert_eq!(
        outcome,
        AuthOutcome::Ready(Identity::new(
            account.record_id,
            Some(Nickname::new("Ada").expect("nickname"))
        ))
    );
}

#[test]
fn non_corrupt_guest_failure_is_attempted_once() {
    let remote = Arc::new(InMemoryRemoteService::new());
    remote.fail_next(
        RemoteOperation::AuthenticateGuest,
        RemoteError::classify(0, "connection refused"),
    );
    let h = default_harness(remote, StoredCredentials::default());

    let err = h
        .queue
        .drive(h.session.authenticate_guest(), TICKS)
        .expect("completes")
        .expect_err("network down");

    assert_eq!(err.remote_kind(), Some(RemoteErrorKind::NetworkFailure));
    assert_eq!(h.remote.call_count(RemoteOperation::AuthenticateGuest), 1);
    assert_eq!(h.credentials.clear_count(), 0);
    assert_eq!(h.session.state(), SessionState::AwaitingUserChoice);
}

#[test]
fn corrupt_guest_identity_is_wiped_and_retried_once() {
    let h = default_harness(
        Arc::new(InMemoryRemoteService::new()),
        StoredCredentials {
            guest: Some(GuestCredential::new("unknown-guest").expect("guest")),
            session_token: None,
        },
    );

    let outcome = h
        .queue
        .drive(h.session.authenticate_guest(), TICKS)
        .expect("completes")
        .expect("retry succeeds");

    assert!(matches!(outcome, AuthOutcome::NicknameRequired(_)));
    assert_eq!(h.remote.call_count(RemoteOperation::AuthenticateGuest), 2);
    assert_eq!(h.credentials.clear_count(), 1);
    let cached_guest = h.credentials.snapshot().guest.expect("new guest cached");
    assert_ne!(cached_guest.expose(), "unknown-guest");
}

#[test]
fn second_corrupt_failure_is_terminal() {
    let remote = Arc::new(InMemoryRemoteService::new());
    remote.fail_next(
        RemoteOperation::AuthenticateGuest,
        RemoteError::classify(401, "bad customId"),
    );
    remote.fail_next(
        RemoteOperation::AuthenticateGuest,
        RemoteError::classify(401, "bad customId again"),
    );
    let h = default_harness(remote, StoredCredentials::default());

    let err = h
        .queue
        .drive(h.session.authenticate_guest(), TICKS)
        .expect("completes")
        .expect_err("terminal");

    assert_eq!(
        err,
        AuthError::Remote(RemoteError::classify(401, "bad customId again"))
    );
    assert_eq!(h.remote.call_count(RemoteOperation::AuthenticateGuest), 2);
    assert_eq!(h.credentials.clear_count(), 1);
}

#[test]
fn failed_wipe_moves_session_to_failed_and_stays_retryable() {
    let remote = Arc::new(InMemoryRemoteService::new());
    remote.fail_next(
        RemoteOperation::AuthenticateGuest,
        RemoteError::classify(401, "bad customId"),
    );
    let queue = Arc::new(RemoteCallQueue::new(remote.clone()));
    let mut store = MockCredentialStore::new();
    store
        .expect_load()
        .returning(|| Ok(StoredCredentials::default()));
    store
        .expect_clear()
        .times(1)
        .return_once(|| Err(CredentialStoreError::io("read-only filesystem")));
    store.expect_save().returning(|_| Ok(()));
    let session = AuthSession::new(
        QueuedRemote::new(Arc::clone(&queue)),
        Arc::new(store),
        Arc::new(UnsupportedIdentityProvider),
        NicknamePolicy::default(),
    );

    let err = queue
        .drive(session.authenticate_guest(), TICKS)
        .expect("completes")
        .expect_err("wipe failed");

    assert!(matches!(err, AuthError::Credentials(_)));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(remote.call_count(RemoteOperation::AuthenticateGuest), 1);

    let retry = queue
        .drive(session.authenticate_guest(), TICKS)
        .expect("completes");
    assert!(retry.is_ok());
}

#[test]
fn federated_login_signs_in_and_exchanges_code() {
    let mut provider = MockIdentityProvider::new();
    provider.expect_is_authenticated().return_const(false);
    provider
        .expect_authenticate()
        .times(1)
        .return_once(|| Ok(SignInStatus::SignedIn));
    provider
        .expect_request_authorization_code()
        .withf(|force_refresh| *force_refresh)
        .times(1)
        .return_once(|_| Ok(Some("auth-code".to_owned())));
    let h = build(
        Arc::new(InMemoryRemoteService::new()),
        StoredCredentials::default(),
        Arc::new(provider),
        NicknamePolicy::default(),
    );

    let outcome = h
        .queue
        .drive(
            h.session.authenticate_federated(&CancellationToken::new()),
            TICKS,
        )
        .expect("completes")
        .expect("exchange succeeds");

    assert!(matches!(outcome, AuthOutcome::NicknameRequired(_)));
    assert_eq!(
        h.remote.call_count(RemoteOperation::ExchangeFederatedCode),
        1
    );
}

#[test]
fn federated_login_skips_sign_in_when_already_authenticated() {
    let mut provider = MockIdentityProvider::new();
    provider.expect_is_authenticated().return_const(true);
    provider.expect_authenticate().never();
    provider
        .expect_request_authorization_code()
        .times(1)
        .return_once(|_| Ok(Some("auth-code".to_owned())));
    let h = build(
        Arc::new(InMemoryRemoteService::new()),
        StoredCredentials::default(),
        Arc::new(provider),
        NicknamePolicy {
            federated: false,
            ..NicknamePolicy::default()
        },
    );

    let outcome = h
        .queue
        .drive(
            h.session.authenticate_federated(&CancellationToken::new()),
            TICKS,
        )
        .expect("completes")
        .expect("exchange succeeds");

    assert!(matches!(outcome, AuthOutcome::Ready(_)));
}

#[test]
fn missing_authorization_code_fails_without_exchange() {
    let mut provider = MockIdentityProvider::new();
    provider.expect_is_authenticated().return_const(true);
    provider
        .expect_request_authorization_code()
        .return_once(|_| Ok(None));
    let h = build(
        Arc::new(InMemoryRemoteService::new()),
        StoredCredentials::default(),
        Arc::new(provider),
        NicknamePolicy::default(),
    );

    let err = h
        .queue
        .drive(
            h.session.authenticate_federated(&CancellationToken::new()),
            TICKS,
        )
        .expect("completes")
        .expect_err("no code");

    assert_eq!(err.remote_kind(), Some(RemoteErrorKind::Unauthenticated));
    assert_eq!(h.session.state(), SessionState::AwaitingUserChoice);
    assert!(h.session.identity().is_none());
    assert_eq!(h.remote.total_calls(), 0);
}

#[test]
fn cancelled_federated_login_resolves_cancelled() {
    let mut provider = MockIdentityProvider::new();
    provider.expect_is_authenticated().return_const(false);
    provider.expect_authenticate().never();
    let h = build(
        Arc::new(InMemoryRemoteService::new()),
        StoredCredentials::default(),
        Arc::new(provider),
        NicknamePolicy::default(),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .queue
        .drive(h.session.authenticate_federated(&cancel), TICKS)
        .expect("completes")
        .expect_err("cancelled");

    assert_eq!(err.remote_kind(), Some(RemoteErrorKind::Cancelled));
    assert_eq!(h.session.state(), SessionState::AwaitingUserChoice);
}

#[test]
fn unsupported_provider_reports_platform_unsupported() {
    let h = default_harness(
        Arc::new(InMemoryRemoteService::new()),
        StoredCredentials::default(),
    );

    let err = h
        .queue
        .drive(
            h.session.authenticate_federated(&CancellationToken::new()),
            TICKS,
        )
        .expect("completes")
        .expect_err("unsupported");

    assert_eq!(err.remote_kind(), Some(RemoteErrorKind::PlatformUnsupported));
}

fn nickname_required_harness() -> Harness {
    let h = default_harness(
        Arc::new(InMemoryRemoteService::new()),
        StoredCredentials::default(),
    );
    h.queue
        .drive(h.session.authenticate_guest(), TICKS)
        .expect("completes")
        .expect("guest created");
    assert_eq!(h.session.state(), SessionState::NicknameRequired);
    h
}

#[test]
fn nickname_submission_outside_gate_is_rejected() {
    let h = default_harness(
        Arc::new(InMemoryRemoteService::new()),
        StoredCredentials::default(),
    );

    let err = h
        .queue
        .drive(h.session.submit_nickname("Ada"), TICKS)
        .expect("completes")
        .expect_err("wrong state");

    assert_eq!(
        err,
        AuthError::InvalidState {
            operation: "submit a nickname",
            state: SessionState::Unauthenticated,
        }
    );
    assert_eq!(h.session.state(), SessionState::Unauthenticated);
}

#[rstest]
#[case("   ")]
#[case("this nickname is far too long")]
fn malformed_nickname_keeps_gate(#[case] raw: &str) {
    let h = nickname_required_harness();

    let err = h
        .queue
        .drive(h.session.submit_nickname(raw), TICKS)
        .expect("completes")
        .expect_err("malformed");

    assert!(matches!(err, AuthError::Nickname(_)));
    assert_eq!(h.session.state(), SessionState::NicknameRequired);
    assert_eq!(h.remote.call_count(RemoteOperation::UpdateNickname), 0);
}

#[test]
fn duplicate_nickname_keeps_gate() {
    let h = nickname_required_harness();
    h.remote.reserve_nickname("Taken");

    let err = h
        .queue
        .drive(h.session.submit_nickname("Taken"), TICKS)
        .expect("completes")
        .expect_err("duplicate");

    assert_eq!(err.remote_kind(), Some(RemoteErrorKind::ValidationFailure));
    assert_eq!(h.session.state(), SessionState::NicknameRequired);
    assert!(
        h.session
            .identity()
            .is_some_and(|identity| identity.nickname().is_none())
    );
}

#[test]
fn accepted_nickname_makes_session_ready() {
    let h = nickname_required_harness();

    let identity = h
        .queue
        .drive(h.session.submit_nickname("  Ada "), TICKS)
        .expect("completes")
        .expect("accepted");

    assert_eq!(identity.nickname().map(AsRef::as_ref), Some("Ada"));
    assert_eq!(h.session.state(), SessionState::Ready);
    assert_eq!(h.session.identity(), Some(identity));
}

#[test]
fn login_from_ready_is_invalid() {
    let h = nickname_required_harness();
    h.queue
        .drive(h.session.submit_nickname("Ada"), TICKS)
        .expect("completes")
        .expect("accepted");

    let err = h
        .queue
        .drive(h.session.authenticate_guest(), TICKS)
        .expect("completes")
        .expect_err("already ready");

    assert!(matches!(
        err,
        AuthError::InvalidState {
            state: SessionState::Ready,
            ..
        }
    ));
    assert_eq!(h.session.state(), SessionState::Ready);
}

#[test]
fn abandoned_guest_login_can_be_retried() {
    let h = default_harness(
        Arc::new(InMemoryRemoteService::new().with_latency(10)),
        StoredCredentials::default(),
    );

    let abandoned = h.queue.drive(h.session.authenticate_guest(), 2);
    assert_eq!(
        abandoned.map(|_| ()),
        Err(crate::domain::QueueDriveError::TickBudgetExhausted { ticks: 2 })
    );
    assert_eq!(h.session.state(), SessionState::AwaitingUserChoice);

    let outcome = h
        .queue
        .drive(h.session.authenticate_guest(), TICKS)
        .expect("completes")
        .expect("retry signs in");

    assert!(matches!(outcome, AuthOutcome::NicknameRequired(_)));
    assert_eq!(h.session.state(), SessionState::NicknameRequired);
}

#[test]
fn abandoned_auto_login_awaits_user_choice() {
    let remote = Arc::new(InMemoryRemoteService::new().with_latency(10));
    let account = remote.create_guest_account(Some("Ada"));
    let h = default_harness(
        remote,
        StoredCredentials {
            guest: None,
            session_token: Some(account.token),
        },
    );

    let abandoned = h.queue.drive(h.session.authenticate_auto(), 2);

    assert!(abandoned.is_err());
    assert_eq!(h.session.state(), SessionState::AwaitingUserChoice);
    assert!(h.session.identity().is_none());
}
