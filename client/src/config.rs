//! Client configuration loaded via OrthoConfig.
//!
//! Values come from `GAME_CLIENT_*` environment variables or a configuration
//! file, never from the command line: the binary owns its arguments.
//! [`ClientSettings::validate`] rejects combinations the composition root
//! cannot build.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoResult};
use serde::Deserialize;
use url::Url;

const DEFAULT_CREDENTIALS_DIR: &str = ".game-client";
const PROGRAM_NAME: &str = "client";

/// Errors raised when settings are inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// HTTP mode was selected without a backend URL.
    #[error("backend_url is required unless offline mode is enabled")]
    MissingBackendUrl,
    /// The backend URL could not be parsed.
    #[error("backend_url {value:?} is not a valid URL: {reason}")]
    InvalidBackendUrl {
        /// Raw configured value.
        value: String,
        /// Parser message.
        reason: String,
    },
    /// A numeric setting must be positive.
    #[error("{field} must be greater than zero")]
    NotPositive {
        /// Offending setting name.
        field: &'static str,
    },
}

/// Configuration values controlling the client bootstrap.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "GAME_CLIENT")]
pub struct ClientSettings {
    /// Base URL of the remote account and record service.
    pub backend_url: Option<String>,
    /// Per-request timeout for the HTTP adapter, in seconds.
    #[ortho_config(default = 10)]
    pub request_timeout_secs: u64,
    /// Directory holding the cached credential file.
    pub credentials_dir: Option<PathBuf>,
    /// Host tick rate used when pacing the queue.
    #[ortho_config(default = 60)]
    pub tick_hz: u32,
    /// Use the in-process remote service instead of HTTP.
    #[ortho_config(default = false)]
    pub offline: bool,
    /// Ask for a nickname after token login when the account has none.
    #[ortho_config(default = false)]
    pub check_nickname_on_token_login: bool,
    /// Tick budget for the final save during shutdown.
    #[ortho_config(default = 600)]
    pub shutdown_flush_ticks: usize,
    /// Tick budget for each login step driven by the binary.
    #[ortho_config(default = 3600)]
    pub max_login_ticks: usize,
}

impl ClientSettings {
    /// Load settings from the environment and configuration files.
    ///
    /// The loader sees only the program name, so flags meant for the binary
    /// never reach it.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when a value cannot be parsed.
    pub fn load_from_environment() -> OrthoResult<Self> {
        Self::load_from_iter([OsString::from(PROGRAM_NAME)])
    }

    /// Check the settings for values the client cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first [`SettingsError`] found.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.offline {
            self.backend_url()?;
        }
        let counters = [
            ("request_timeout_secs", self.request_timeout_secs == 0),
            ("tick_hz", self.tick_hz == 0),
            ("shutdown_flush_ticks", self.shutdown_flush_ticks == 0),
            ("max_login_ticks", self.max_login_ticks == 0),
        ];
        match counters.into_iter().find(|(_, zero)| *zero) {
            Some((field, _)) => Err(SettingsError::NotPositive { field }),
            None => Ok(()),
        }
    }

    /// Parsed backend URL.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::MissingBackendUrl`] when unset and
    /// [`SettingsError::InvalidBackendUrl`] when unparsable.
    pub fn backend_url(&self) -> Result<Url, SettingsError> {
        let raw = self
            .backend_url
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .ok_or(SettingsError::MissingBackendUrl)?;
        Url::parse(raw).map_err(|err| SettingsError::InvalidBackendUrl {
            value: raw.to_owned(),
            reason: err.to_string(),
        })
    }

    /// Configured credentials directory, falling back to `.game-client`.
    pub fn credentials_dir(&self) -> PathBuf {
        self.credentials_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_DIR))
    }

    /// HTTP request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Interval between host ticks.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(1) / self.tick_hz.max(1)
    }
}
