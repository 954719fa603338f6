//! Identity data model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Validation errors returned by the identity value constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityValidationError {
    /// The record id was blank.
    EmptyRecordId,
    /// The nickname was blank.
    EmptyNickname,
    /// The nickname exceeded the length limit.
    NicknameTooLong {
        /// Maximum length in characters.
        max: usize,
    },
}

impl fmt::Display for IdentityValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRecordId => write!(f, "remote record id must not be empty"),
            Self::EmptyNickname => write!(f, "nickname must not be empty"),
            Self::NicknameTooLong { max } => {
                write!(f, "nickname must be at most {max} characters")
            }
        }
    }
}

impl std::error::Error for IdentityValidationError {}

/// Identifier of the account record on the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Validate and construct a [`RecordId`].
    pub fn new(id: impl Into<String>) -> Result<Self, IdentityValidationError> {
        Self::from_owned(id.into())
    }

    fn from_owned(id: String) -> Result<Self, IdentityValidationError> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(IdentityValidationError::EmptyRecordId);
        }
        if trimmed.len() == id.len() {
            Ok(Self(id))
        } else {
            Ok(Self(trimmed.to_owned()))
        }
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<RecordId> for String {
    fn from(value: RecordId) -> Self {
        value.0
    }
}

impl TryFrom<String> for RecordId {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Maximum nickname length in characters.
pub const NICKNAME_MAX: usize = 20;

/// Public display name chosen by the player.
///
/// Input is trimmed before validation; the stored value never carries
/// leading or trailing whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nickname(String);

impl Nickname {
    /// Trim, validate and construct a [`Nickname`].
    pub fn new(nickname: impl AsRef<str>) -> Result<Self, IdentityValidationError> {
        let trimmed = nickname.as_ref().trim();
        if trimmed.is_empty() {
            return Err(IdentityValidationError::EmptyNickname);
        }
        if trimmed.chars().count() > NICKNAME_MAX {
            return Err(IdentityValidationError::NicknameTooLong { max: NICKNAME_MAX });
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for Nickname {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Nickname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<Nickname> for String {
    fn from(value: Nickname) -> Self {
        value.0
    }
}

impl TryFrom<String> for Nickname {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// The authenticated account as seen by the client.
///
/// Only the session produces values of this type; holding one means the
/// client is authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    remote_record_id: RecordId,
    nickname: Option<Nickname>,
}

impl Identity {
    /// Build an identity from its parts.
    pub fn new(remote_record_id: RecordId, nickname: Option<Nickname>) -> Self {
        Self {
            remote_record_id,
            nickname,
        }
    }

    /// Remote account record id.
    pub fn remote_record_id(&self) -> &RecordId {
        &self.remote_record_id
    }

    /// Confirmed nickname, if one has been set.
    pub fn nickname(&self) -> Option<&Nickname> {
        self.nickname.as_ref()
    }

    /// Copy of this identity with the nickname replaced.
    #[must_use]
    pub fn with_nickname(&self, nickname: Nickname) -> Self {
        Self {
            remote_record_id: self.remote_record_id.clone(),
            nickname: Some(nickname),
        }
    }
}

/// Read access to the current identity.
///
/// Data services use this seam to learn whose records to address without
/// depending on the whole session.
pub trait IdentitySource: Send + Sync {
    /// Snapshot of the current identity, `None` when unauthenticated.
    fn current_identity(&self) -> Option<Identity>;
}
