//! Server configuration.
//!
//! Defaults can be overridden by a JSON file, and the file by command-line
//! flags. Fields missing from the file keep their defaults.

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use otp_core::Role;
use otp_core::framing::DEFAULT_MAX_FRAME_LEN;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;

/// Errors raised while loading or checking a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config file '{}': {source}", path.display())]
    Read {
        /// The file that was being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// The configuration file is not valid JSON for [`ServerConfig`].
    #[error("cannot parse config file '{}': {source}", path.display())]
    Parse {
        /// The file that was being read.
        path: PathBuf,
        /// The JSON error.
        source: serde_json::Error,
    },
    /// `max_sessions` is zero or larger than the runtime can track.
    #[error("max_sessions must be at least 1 and within the semaphore limit, got {0}")]
    MaxSessions(usize),
}

/// Settings for one server process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Which transform this server performs.
    pub role: Role,
    /// Address to listen on.
    pub bind: IpAddr,
    /// Sessions served at once; further clients wait for a free slot.
    pub max_sessions: usize,
    /// Largest text or key frame accepted, in bytes.
    pub max_frame_len: u32,
    /// Abort sessions that take longer than this many seconds. Unset means
    /// no limit.
    pub session_timeout_secs: Option<u64>,
    /// Seconds to wait for running sessions after shutdown is requested;
    /// sessions still running then are aborted.
    pub shutdown_grace_secs: u64,
}

impl ServerConfig {
    /// Number of concurrent sessions when none is configured.
    pub const DEFAULT_MAX_SESSIONS: usize = 5;

    /// Shutdown grace period when none is configured.
    pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

    /// Default settings for a server performing `role`.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            ..Self::default()
        }
    }

    /// Reads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] if the file
    /// cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks that the settings can be served.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MaxSessions`] for an unusable session cap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sessions == 0 || self.max_sessions > Semaphore::MAX_PERMITS {
            return Err(ConfigError::MaxSessions(self.max_sessions));
        }
        Ok(())
    }

    /// The session time limit, if one is set.
    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_secs.map(Duration::from_secs)
    }

    /// How long shutdown waits for running sessions.
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            role: Role::Encrypt,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            max_sessions: Self::DEFAULT_MAX_SESSIONS,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            session_timeout_secs: None,
            shutdown_grace_secs: Self::DEFAULT_SHUTDOWN_GRACE_SECS,
        }
    }
}
