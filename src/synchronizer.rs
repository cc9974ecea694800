//! Run-state synchronizer
//!
//! Owns the control loop that keeps the scouting DAQ in step with the
//! facility. Every cycle:
//!
//! 1. fetch a [`FacilitySnapshot`] from the [`StatusFeed`]
//! 2. classify it against the beam-mode and DAQ-state allow-lists
//! 3. evaluate the start condition, then the stop condition
//! 4. sleep for the polling delay
//!
//! The synchronizer state changes only after the peer acknowledges a command.
//! A failed poll or an unacknowledged command leaves the state untouched, is
//! logged, and is retried on the next cycle. Nothing here terminates the loop.
//!
//! ## Resend policy
//!
//! With [`ResendPolicy::OnTransition`] a command is only sent when it would
//! change the state: `Start` from `Idle`, `Stop` from `Active`. A new run number
//! observed while active is handled as `Stop` followed by `Start`.
//!
//! With [`ResendPolicy::EveryCycle`] the command matching the snapshot is sent
//! on every cycle, which tolerates a peer that restarted and lost its state.

use crate::adapters::control_link::{ControlCommand, ControlLink};
use crate::classifier::{is_desired_active, AllowList};
use crate::config::{ResendPolicy, SyncConfig};
use crate::snapshot::{FacilitySnapshot, StatusFeed};
use std::time::Duration;
use tracing::{info, warn};

/// Scouting state as last confirmed by the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Scouting is not running
    #[default]
    Idle,
    /// Scouting is running for this run number (always > 0)
    Active(u64),
}

impl SyncState {
    /// Active run number, 0 when idle
    pub fn current_run(&self) -> u64 {
        match self {
            SyncState::Idle => 0,
            SyncState::Active(run) => *run,
        }
    }

    /// True while scouting is running
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Active(_))
    }
}

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The status feed could not be read; nothing was sent
    PollFailed,
    /// Scouting should run but the snapshot carries no run number; nothing was sent
    MissingRunNumber,
    /// No command was needed
    Steady,
    /// `Start` was acknowledged
    Started(u64),
    /// `Stop` was acknowledged; carries the run that was active (0 if none)
    Stopped(u64),
    /// The active run changed and both `Stop` and `Start` were acknowledged
    Rolled {
        /// Run stopped
        from: u64,
        /// Run started
        to: u64,
    },
    /// A command was sent but not acknowledged
    CommandFailed(ControlCommand),
}

/// The control loop and its state.
pub struct Synchronizer<F, L> {
    feed: F,
    link: L,
    allowed_beam_modes: AllowList,
    allowed_daq_states: AllowList,
    polling_delay: Duration,
    policy: ResendPolicy,
    state: SyncState,
}

impl<F: StatusFeed, L: ControlLink> Synchronizer<F, L> {
    /// Create an idle synchronizer.
    pub fn new(feed: F, link: L, config: &SyncConfig) -> Self {
        Self {
            feed,
            link,
            allowed_beam_modes: AllowList::new(&config.allowed_beam_modes),
            allowed_daq_states: AllowList::new(&config.allowed_daq_states),
            polling_delay: config.polling_delay(),
            policy: config.resend_policy,
            state: SyncState::Idle,
        }
    }

    /// Current state
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Run forever, one cycle per polling interval.
    pub async fn run(&mut self) {
        info!(
            delay = ?self.polling_delay,
            policy = ?self.policy,
            "Run-state synchronizer started"
        );
        loop {
            self.run_cycle().await;
            tokio::time::sleep(self.polling_delay).await;
        }
    }

    /// Run `cycles` cycles, sleeping after each, and return their outcomes.
    pub async fn run_for(&mut self, cycles: usize) -> Vec<CycleOutcome> {
        let mut outcomes = Vec::with_capacity(cycles);
        for _ in 0..cycles {
            outcomes.push(self.run_cycle().await);
            tokio::time::sleep(self.polling_delay).await;
        }
        outcomes
    }

    /// Poll, classify and, if needed, command the peer once.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let snapshot = match self.feed.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, current_run = self.state.current_run(), "Status poll failed, skipping cycle");
                return CycleOutcome::PollFailed;
            }
        };

        info!(
            run = snapshot.run_number,
            beam_mode = %snapshot.beam_mode,
            daq_state = %snapshot.daq_state,
            "Facility state"
        );

        let desired = is_desired_active(
            &snapshot,
            &self.allowed_beam_modes,
            &self.allowed_daq_states,
        );

        if desired {
            self.evaluate_start(&snapshot).await
        } else {
            self.evaluate_stop().await
        }
    }

    async fn evaluate_start(&mut self, snapshot: &FacilitySnapshot) -> CycleOutcome {
        let run = snapshot.run_number;
        if run == 0 {
            warn!("Conditions allow scouting but the snapshot has no run number");
            return CycleOutcome::MissingRunNumber;
        }

        match (self.policy, self.state) {
            (ResendPolicy::OnTransition, SyncState::Active(current)) if current == run => {
                info!(run, "Scouting already running for this run, not resending");
                CycleOutcome::Steady
            }
            (ResendPolicy::OnTransition, SyncState::Active(current)) => {
                info!(from = current, to = run, "Run number changed, restarting scouting");
                if !self.stop().await {
                    return CycleOutcome::CommandFailed(ControlCommand::Stop);
                }
                if self.start(run).await {
                    CycleOutcome::Rolled { from: current, to: run }
                } else {
                    CycleOutcome::CommandFailed(ControlCommand::Start(run))
                }
            }
            _ => {
                if self.start(run).await {
                    CycleOutcome::Started(run)
                } else {
                    CycleOutcome::CommandFailed(ControlCommand::Start(run))
                }
            }
        }
    }

    async fn evaluate_stop(&mut self) -> CycleOutcome {
        if self.policy == ResendPolicy::OnTransition && !self.state.is_active() {
            info!("Scouting already stopped, not resending");
            return CycleOutcome::Steady;
        }

        let previous = self.state.current_run();
        if self.stop().await {
            CycleOutcome::Stopped(previous)
        } else {
            CycleOutcome::CommandFailed(ControlCommand::Stop)
        }
    }

    /// Send `Start(run)`; on acknowledgment the state becomes `Active(run)`.
    async fn start(&mut self, run: u64) -> bool {
        info!(run, "Starting scouting");
        self.send(ControlCommand::Start(run)).await
    }

    /// Send `Stop`; on acknowledgment the state becomes `Idle`.
    async fn stop(&mut self) -> bool {
        info!(run = self.state.current_run(), "Stopping scouting");
        self.send(ControlCommand::Stop).await
    }

    /// Deliver one command and apply it to the state only if acknowledged.
    async fn send(&mut self, command: ControlCommand) -> bool {
        // Stop carries no run number; report the run it ends.
        let run = command
            .run_number()
            .unwrap_or_else(|| self.state.current_run());

        match self.link.send(command).await {
            Ok(ack) => {
                self.state = match command {
                    ControlCommand::Start(run) => SyncState::Active(run),
                    ControlCommand::Stop => SyncState::Idle,
                };
                info!(command = %command, run, response = %ack.response.trim(), "Command acknowledged");
                true
            }
            Err(e) => {
                warn!(command = %command, run, error = %e, "Command not acknowledged, will retry next cycle");
                false
            }
        }
    }
}
