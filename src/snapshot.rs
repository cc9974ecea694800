//! Facility status snapshots.
//!
//! The status feed is polled once per cycle. Each poll produces a fresh
//! [`FacilitySnapshot`] that is classified once and then dropped.
//!
//! ## Wire format
//!
//! The feed answers an HTTP GET with a JSON object carrying at least:
//!
//! ```json
//! { "runNumber": 123, "lhcBeamMode": "STABLE BEAMS", "daqState": "Running" }
//! ```
//!
//! Any other field is ignored. A missing field, a wrong type, or a negative
//! run number is a [`TransportError::Malformed`] for that cycle.

use crate::config::StatusFeedConfig;
use crate::error::{AppResult, TransportError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Observed facility state at the time of one poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilitySnapshot {
    /// Run currently taken by the primary DAQ
    #[serde(rename = "runNumber")]
    pub run_number: u64,
    /// Accelerator beam mode, as reported
    #[serde(rename = "lhcBeamMode")]
    pub beam_mode: String,
    /// Primary DAQ state, as reported
    #[serde(rename = "daqState")]
    pub daq_state: String,
}

impl FacilitySnapshot {
    /// Build a snapshot from its parts
    pub fn new(run_number: u64, beam_mode: impl Into<String>, daq_state: impl Into<String>) -> Self {
        Self {
            run_number,
            beam_mode: beam_mode.into(),
            daq_state: daq_state.into(),
        }
    }

    /// Parse a status feed payload.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Malformed`] if the body is not JSON or a
    /// required field is missing or mistyped.
    pub fn from_json(body: &[u8]) -> Result<Self, TransportError> {
        serde_json::from_slice(body).map_err(|e| TransportError::Malformed(e.to_string()))
    }
}

/// A source of facility snapshots.
#[async_trait]
pub trait StatusFeed: Send + Sync {
    /// Fetch the current snapshot. Never retries internally.
    async fn fetch_snapshot(&self) -> Result<FacilitySnapshot, TransportError>;
}

/// Status feed served over HTTP.
#[derive(Debug, Clone)]
pub struct HttpStatusFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpStatusFeed {
    /// Create a feed client with the configured URL and request timeout.
    ///
    /// # Errors
    ///
    /// Fails if the underlying HTTP client cannot be constructed (TLS backend
    /// initialisation).
    pub fn new(config: &StatusFeedConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(TransportError::from)?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// Endpoint being polled
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl StatusFeed for HttpStatusFeed {
    async fn fetch_snapshot(&self) -> Result<FacilitySnapshot, TransportError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let snapshot = FacilitySnapshot::from_json(&body)?;
        debug!(
            run = snapshot.run_number,
            beam_mode = %snapshot.beam_mode,
            daq_state = %snapshot.daq_state,
            "Fetched facility snapshot"
        );
        Ok(snapshot)
    }
}
