//! JSON credential cache stored in a capability-scoped directory.
//!
//! The adapter opens its directory once through `cap_std` and never touches
//! paths outside it. Writes go to a sibling temporary file that is then
//! renamed over the cache so a crash never leaves a half-written file.

use std::io;
use std::path::{Path, PathBuf};

use cap_std::{ambient_authority, fs::Dir};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::ports::{CredentialStore, CredentialStoreError};
use crate::domain::{GuestCredential, SessionToken, StoredCredentials};

/// File name of the credential cache inside the configured directory.
pub const CREDENTIALS_FILE_NAME: &str = "credentials.json";
const STAGING_FILE_NAME: &str = "credentials.json.tmp";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    guest_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
}

impl CredentialsFile {
    fn from_domain(credentials: &StoredCredentials) -> Self {
        Self {
            guest_id: credentials
                .guest
                .as_ref()
                .map(|guest| guest.expose().to_owned()),
            session_token: credentials
                .session_token
                .as_ref()
                .map(|token| token.expose().to_owned()),
            saved_at: Some(Utc::now()),
        }
    }

    fn into_domain(self) -> Result<StoredCredentials, CredentialStoreError> {
        // Blank entries are treated as absent rather than corrupt.
        let guest = self
            .guest_id
            .filter(|raw| !raw.trim().is_empty())
            .map(GuestCredential::new)
            .transpose()
            .map_err(|err| CredentialStoreError::corrupt(err.to_string()))?;
        let session_token = self
            .session_token
            .filter(|raw| !raw.trim().is_empty())
            .map(SessionToken::new)
            .transpose()
            .map_err(|err| CredentialStoreError::corrupt(err.to_string()))?;
        Ok(StoredCredentials {
            guest,
            session_token,
        })
    }
}

/// Credential store persisting to `credentials.json` in one directory.
#[derive(Debug)]
pub struct FileCredentialStore {
    directory: Dir,
    location: PathBuf,
}

impl FileCredentialStore {
    /// Open (creating when missing) the credential directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialStoreError::Io`] when the directory cannot be
    /// created or opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CredentialStoreError> {
        let path = path.as_ref();
        Dir::create_ambient_dir_all(path, ambient_authority())
            .map_err(|err| io_error("create credentials directory", path, &err))?;
        let directory = Dir::open_ambient_dir(path, ambient_authority())
            .map_err(|err| io_error("open credentials directory", path, &err))?;
        Ok(Self {
            directory,
            location: path.join(CREDENTIALS_FILE_NAME),
        })
    }

    /// Path of the cache file, for diagnostics.
    pub fn location(&self) -> &Path {
        &self.location
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<StoredCredentials, CredentialStoreError> {
        let contents = match self.directory.read_to_string(CREDENTIALS_FILE_NAME) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.location.display(), "no cached credentials");
                return Ok(StoredCredentials::default());
            }
            Err(err) => return Err(io_error("read credentials", &self.location, &err)),
        };
        serde_json::from_str::<CredentialsFile>(&contents)
            .map_err(|err| CredentialStoreError::corrupt(err.to_string()))?
            .into_domain()
    }

    fn save(&self, credentials: &StoredCredentials) -> Result<(), CredentialStoreError> {
        let body = serde_json::to_vec_pretty(&CredentialsFile::from_domain(credentials))
            .map_err(|err| CredentialStoreError::io(err.to_string()))?;
        self.directory
            .write(STAGING_FILE_NAME, body)
            .map_err(|err| io_error("write credentials", &self.location, &err))?;
        self.directory
            .rename(STAGING_FILE_NAME, &self.directory, CREDENTIALS_FILE_NAME)
            .map_err(|err| io_error("replace credentials", &self.location, &err))?;
        debug!(path = %self.location.display(), "credentials saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialStoreError> {
        match self.directory.remove_file(CREDENTIALS_FILE_NAME) {
            Ok(()) => {
                debug!(path = %self.location.display(), "credentials cleared");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error("remove credentials", &self.location, &err)),
        }
    }
}

fn io_error(action: &str, path: &Path, err: &io::Error) -> CredentialStoreError {
    CredentialStoreError::io(format!("{action} at {}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn temp() -> TempDir {
        TempDir::new().expect("create temp dir")
    }

    fn credentials(guest: Option<&str>, token: Option<&str>) -> StoredCredentials {
        StoredCredentials {
            guest: guest.map(|raw| GuestCredential::new(raw).expect("valid guest")),
            session_token: token.map(|raw| SessionToken::new(raw).expect("valid token")),
        }
    }

    #[rstest]
    fn missing_file_loads_as_empty(temp: TempDir) {
        let store = FileCredentialStore::open(temp.path()).expect("open store");
        assert!(store.load().expect("load").is_empty());
    }

    #[rstest]
    fn saved_credentials_survive_reopening(temp: TempDir) {
        let expected = credentials(Some("guest-1"), Some("token-1"));
        FileCredentialStore::open(temp.path())
            .expect("open store")
            .save(&expected)
            .expect("save");

        let reopened = FileCredentialStore::open(temp.path()).expect("reopen store");
        assert_eq!(reopened.load().expect("load"), expected);
    }

    #[rstest]
    fn opening_creates_nested_directories(temp: TempDir) {
        let nested = temp.path().join("profile").join("cache");
        let store = FileCredentialStore::open(&nested).expect("open store");
        store
            .save(&credentials(Some("guest-1"), None))
            .expect("save");
        assert!(nested.join(CREDENTIALS_FILE_NAME).exists());
        assert!(!nested.join(STAGING_FILE_NAME).exists());
    }

    #[rstest]
    fn clear_removes_the_file_and_tolerates_repeats(temp: TempDir) {
        let store = FileCredentialStore::open(temp.path()).expect("open store");
        store
            .save(&credentials(Some("guest-1"), Some("token-1")))
            .expect("save");

        store.clear().expect("first clear");
        store.clear().expect("second clear");

        assert!(store.load().expect("load").is_empty());
    }

    #[rstest]
    #[case::not_json("{{{")]
    #[case::wrong_shape("{\"guest_id\": 7}")]
    fn unreadable_contents_are_reported_as_corrupt(temp: TempDir, #[case] contents: &str) {
        let store = FileCredentialStore::open(temp.path()).expect("open store");
        store
            .directory
            .write(CREDENTIALS_FILE_NAME, contents)
            .expect("seed file");

        let err = store.load().expect_err("corrupt contents");
        assert!(matches!(err, CredentialStoreError::Corrupt { .. }));
    }

    #[rstest]
    fn blank_entries_load_as_absent(temp: TempDir) {
        let store = FileCredentialStore::open(temp.path()).expect("open store");
        store
            .directory
            .write(
                CREDENTIALS_FILE_NAME,
                "{\"guest_id\": \"  \", \"session_token\": \"tok\"}",
            )
            .expect("seed file");

        assert_eq!(store.load().expect("load"), credentials(None, Some("tok")));
    }
}
