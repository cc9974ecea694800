//! Core library for the scout_sync application.
//!
//! Keeps the scouting DAQ in step with the live state of the facility: a
//! control loop polls the DAQ status feed, decides from the beam mode and DAQ
//! state whether scouting should be running, and starts or stops the scouting
//! peer over a one-command-per-connection TCP protocol.
//!
//! The library also hosts the file mover that compresses completed scouting
//! files out of the ramdisk. It runs as its own task, independent of the loop.

pub mod adapters;
pub mod classifier;
pub mod config;
pub mod error;
pub mod file_mover;
pub mod logging;
pub mod snapshot;
pub mod synchronizer;

pub use adapters::{ControlCommand, ControlLink, TcpControlLink};
pub use classifier::{is_desired_active, AllowList};
pub use config::Settings;
pub use error::{AppResult, ControlError, SyncError, TransportError};
pub use snapshot::{FacilitySnapshot, HttpStatusFeed, StatusFeed};
pub use synchronizer::{CycleOutcome, SyncState, Synchronizer};
