//! Configuration System
//!
//! Strongly-typed settings loaded with Figment.
//!
//! # Configuration Sources
//!
//! Configuration is merged from (lowest to highest precedence):
//! 1. Built-in defaults ([`Settings::default`])
//! 2. TOML configuration file (default: `config/scout_sync.toml`)
//! 3. Environment variables prefixed with `SCOUT_SYNC_`
//!
//! # Environment Variables
//!
//! Nested keys are separated by a double underscore:
//!
//! ```text
//! # Talk to a scouting peer on another port
//! SCOUT_SYNC_PEER__PORT=8001
//!
//! # Poll every 10 seconds
//! SCOUT_SYNC_SYNC__POLLING_DELAY_SECS=10
//!
//! # Structured logs
//! SCOUT_SYNC_LOG__FORMAT=json
//! ```

pub mod settings;

pub use settings::{
    FileMoverConfig, LogConfig, LogFormat, PeerConfig, ResendPolicy, Settings, StatusFeedConfig,
    SyncConfig, DEFAULT_CONFIG_PATH,
};
