//! Synchronizer settings loaded with Figment.
//!
//! Every value has a default matching the production deployment, so an empty
//! or missing file is a valid configuration. Settings are read once at startup
//! and are immutable for the lifetime of the process.
//!
//! # Example
//!
//! ```no_run
//! use scout_sync::config::Settings;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load_from("config/scout_sync.toml")?;
//!     println!("Peer: {}", settings.peer.address());
//!     println!("Polling every {:?}", settings.sync.polling_delay());
//!     Ok(())
//! }
//! ```

use crate::error::ConfigError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/scout_sync.toml";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "SCOUT_SYNC_";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where facility snapshots are fetched from
    pub status_feed: StatusFeedConfig,
    /// Scouting peer receiving start/stop commands
    pub peer: PeerConfig,
    /// Control loop settings
    pub sync: SyncConfig,
    /// Compressed file relocation task
    pub file_mover: FileMoverConfig,
    /// Logging output
    pub log: LogConfig,
}

/// Status feed (HTTP) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusFeedConfig {
    /// Snapshot endpoint returning JSON
    pub url: String,
    /// Upper bound for the whole HTTP request
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// Scouting peer (TCP) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Host name or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Upper bound for establishing the connection
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Upper bound for writing the command and reading the reply
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
}

/// When start/stop commands are (re)sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResendPolicy {
    /// Only send a command when it would change the synchronizer state.
    #[default]
    OnTransition,
    /// Send the command matching the snapshot on every cycle, whatever the state.
    EveryCycle,
}

/// Control loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds to sleep between polls
    pub polling_delay_secs: u64,
    /// Beam modes in which scouting should run (case-insensitive)
    pub allowed_beam_modes: Vec<String>,
    /// DAQ states in which scouting should run (case-insensitive)
    pub allowed_daq_states: Vec<String>,
    /// Start/stop resend behavior
    pub resend_policy: ResendPolicy,
}

/// File mover configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileMoverConfig {
    /// Directory the scouting DAQ writes completed files into
    pub source_dir: PathBuf,
    /// Directory compressed files are written to
    pub dest_dir: PathBuf,
    /// Only files ending with this suffix are moved
    pub suffix: String,
    /// External compressor, invoked as `<codec> <file> -c`
    pub codec: String,
    /// Appended to the file name of the compressed output
    pub compressed_extension: String,
    /// Sleep when no file is waiting
    #[serde(with = "humantime_serde")]
    pub idle_wait: Duration,
    /// Sleep after the source directory could not be read
    #[serde(with = "humantime_serde")]
    pub error_backoff: Duration,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error)
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for StatusFeedConfig {
    fn default() -> Self {
        Self {
            url: "http://daq-expert.cms:8081/DAQSnapshotService/getsnapshot?setup=cdaq"
                .to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            polling_delay_secs: 30,
            allowed_beam_modes: vec!["STABLE BEAMS".to_string()],
            allowed_daq_states: vec!["RUNNING".to_string()],
            resend_policy: ResendPolicy::default(),
        }
    }
}

impl Default for FileMoverConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("/fff/ramdisk/scdaq"),
            dest_dir: PathBuf::from("/fff/output/scdaq"),
            suffix: ".dat".to_string(),
            codec: "lbzip2".to_string(),
            compressed_extension: ".bz2".to_string(),
            idle_wait: Duration::from_secs(30),
            error_backoff: Duration::from_secs(600),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl PeerConfig {
    /// `host:port` of the scouting peer
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl SyncConfig {
    /// Delay between two polling cycles
    pub fn polling_delay(&self) -> Duration {
        Duration::from_secs(self.polling_delay_secs)
    }
}

impl Settings {
    /// Load configuration from [`DEFAULT_CONFIG_PATH`] and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults and environment overrides
    /// still apply. The result is validated before it is returned.
    ///
    /// # Errors
    ///
    /// Returns a ConfigError if the file cannot be parsed, a value has the
    /// wrong type, or validation fails.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings: Self = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration after loading
    ///
    /// # Errors
    ///
    /// Returns a ConfigError with a descriptive message for the first
    /// invalid value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.status_feed.url.trim().is_empty() {
            return invalid("status_feed.url cannot be empty");
        }
        if self.status_feed.timeout.is_zero() {
            return invalid("status_feed.timeout must be > 0");
        }

        if self.peer.host.trim().is_empty() {
            return invalid("peer.host cannot be empty");
        }
        if self.peer.port == 0 {
            return invalid("peer.port must be > 0");
        }
        if self.peer.connect_timeout.is_zero() || self.peer.read_timeout.is_zero() {
            return invalid("peer timeouts must be > 0");
        }

        if self.sync.polling_delay_secs == 0 {
            return invalid("sync.polling_delay_secs must be > 0");
        }
        if all_blank(&self.sync.allowed_beam_modes) {
            return invalid("sync.allowed_beam_modes must contain a non-blank entry");
        }
        if all_blank(&self.sync.allowed_daq_states) {
            return invalid("sync.allowed_daq_states must contain a non-blank entry");
        }

        if self.file_mover.codec.trim().is_empty() {
            return invalid("file_mover.codec cannot be empty");
        }
        if self.file_mover.suffix.is_empty() {
            return invalid("file_mover.suffix cannot be empty");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log.level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> Result<(), ConfigError> {
    Err(ConfigError::Validation(message.to_string()))
}

/// True for an empty list or one holding only whitespace entries
fn all_blank(values: &[String]) -> bool {
    values.iter().all(|v| v.trim().is_empty())
}
