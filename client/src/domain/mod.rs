//! Domain primitives, services and ports.
//!
//! Purpose: define the session, queue and data-sync behaviour without any
//! knowledge of concrete transports or storage. Adapters live in
//! [`crate::outbound`] and reach the domain only through [`ports`].
//!
//! Public surface:
//! - Value types: [`Identity`], [`RecordId`], [`Nickname`], credentials and
//!   [`DataCategory`].
//! - Errors: [`RemoteError`] and [`RemoteErrorKind`].
//! - Services: [`RemoteCallQueue`], [`DataSyncService`], [`AuthSession`] and
//!   [`LoginOrchestrator`].

pub mod auth;
pub mod auth_session;
pub mod call_queue;
pub mod category;
pub mod data_sync_service;
pub mod error;
pub mod game_data;
pub mod identity;
pub mod login_orchestrator;
pub mod ports;
pub mod queued_remote;
pub mod remote_call;

pub use self::auth::{
    AuthGrant, AuthorizationCode, CredentialValidationError, GuestCredential, SessionToken,
    StoredCredentials,
};
pub use self::auth_session::{
    AuthError, AuthOutcome, AuthSession, LoginPath, NicknamePolicy, SessionState,
};
pub use self::call_queue::{
    CallHandle, CallId, QueueDriveError, QueueState, RemoteCallQueue, TickOutcome,
};
pub use self::category::{CategoryDescriptor, DataCategory, Record, RemoteRow, RowId};
pub use self::data_sync_service::{CategoryOutcome, DataSyncService, LoadedCategories};
pub use self::error::{CORRUPT_IDENTITY_MARKER, RemoteError, RemoteErrorKind};
pub use self::game_data::GameCatalog;
pub use self::identity::{
    Identity, IdentitySource, IdentityValidationError, NICKNAME_MAX, Nickname, RecordId,
};
pub use self::login_orchestrator::{LoginOrchestrator, LoginStatus, WELCOME_ACHIEVEMENT_ID};
pub use self::queued_remote::QueuedRemote;
pub use self::remote_call::{CallOutput, CallResult, RemoteCall, RemoteOperation};
