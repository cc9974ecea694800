//! Custom error types for the synchronizer.
//!
//! This module defines the error taxonomy shared by every component. Using the
//! `thiserror` crate, each failure kind gets its own variant so the control loop
//! can tell them apart instead of swallowing them.
//!
//! ## Error Hierarchy
//!
//! - **`TransportError`**: the status feed could not be read. Covers connection,
//!   DNS and timeout failures, non-2xx HTTP statuses, and payloads that do not
//!   parse into a [`FacilitySnapshot`](crate::snapshot::FacilitySnapshot).
//! - **`ControlError`**: a command to the scouting peer did not take effect,
//!   either because the peer was unreachable or because it answered without
//!   the acknowledgment token.
//! - **`ConfigError`**: loading or validating [`Settings`](crate::config::Settings).
//! - **`SyncError`**: the top-level error for setup and the file mover, created
//!   from transport, configuration and I/O errors with `?`.
//!
//! None of the transport or control errors are fatal. The synchronizer logs them
//! and tries again on the next polling interval.

use thiserror::Error;

/// Convenience alias for results using the top-level error type.
pub type AppResult<T> = std::result::Result<T, SyncError>;

/// Failure to obtain a facility snapshot.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection, DNS, or timeout failure, or the HTTP client could not be built
    #[error("status feed request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The feed answered with a non-2xx status
    #[error("status feed returned HTTP {0}")]
    Status(u16),

    /// The body is not JSON or lacks a required field
    #[error("malformed status payload: {0}")]
    Malformed(String),
}

/// Failure of a single command exchange with the scouting peer.
#[derive(Error, Debug)]
pub enum ControlError {
    /// Connect refused or timed out, or the connection was reset mid-exchange
    #[error("scouting peer {addr} unreachable: {source}")]
    Unreachable {
        /// `host:port` that was dialed
        addr: String,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// The peer replied without the acknowledgment token, or not at all
    #[error("scouting peer did not acknowledge (response: {response:?})")]
    NotAcknowledged {
        /// Raw reply text, empty if the peer closed or the read timed out
        response: String,
    },
}

/// Failure to load or validate configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A source could not be read or a value has the wrong type
    #[error("Configuration load error: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A value parsed but is not acceptable
    #[error("Configuration validation error: {0}")]
    Validation(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

/// Top-level error for the application.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Status feed client error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// File system or process error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The tracing subscriber could not be installed
    #[error("Logging setup failed: {0}")]
    Logging(String),
}
