//! Scripted doubles for the status feed and the control link
//!
//! These stand in for the network so the synchronizer can be driven
//! cycle by cycle in tests. They provide:
//! - Scripted replies, consumed in order
//! - A fallback reply once the script runs out
//! - Call logging for test verification
//!
//! # Example
//!
//! ```
//! use scout_sync::adapters::{MockControlLink, MockReply};
//!
//! let link = MockControlLink::new().with_replies([MockReply::Unreachable, MockReply::Ack]);
//! assert!(link.sent().is_empty());
//! ```

use crate::adapters::control_link::{Acknowledged, ControlCommand, ControlLink};
use crate::error::{ControlError, TransportError};
use crate::snapshot::{FacilitySnapshot, StatusFeed};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

/// Outcome a [`MockControlLink`] produces for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Reply `ok`
    Ack,
    /// Reply with the given text (acknowledged only if it contains `ok`)
    Text(String),
    /// Fail as if the connection was refused
    Unreachable,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Control link that records commands and answers from a script.
#[derive(Debug, Clone)]
pub struct MockControlLink {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    fallback: MockReply,
    sent: Arc<Mutex<Vec<ControlCommand>>>,
}

impl Default for MockControlLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockControlLink {
    /// A link that acknowledges everything
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            fallback: MockReply::Ack,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue replies for the next commands, in order
    pub fn with_replies(self, replies: impl IntoIterator<Item = MockReply>) -> Self {
        lock(&self.replies).extend(replies);
        self
    }

    /// Reply used once the queue is empty
    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = reply;
        self
    }

    /// Every command received so far
    pub fn sent(&self) -> Vec<ControlCommand> {
        lock(&self.sent).clone()
    }

    /// Clear the call log
    pub fn clear_log(&self) {
        lock(&self.sent).clear();
    }
}

#[async_trait]
impl ControlLink for MockControlLink {
    async fn send(&self, command: ControlCommand) -> Result<Acknowledged, ControlError> {
        lock(&self.sent).push(command);

        let reply = lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            MockReply::Ack => Ok(Acknowledged {
                response: "ok".to_string(),
            }),
            MockReply::Text(text) if text.contains(crate::adapters::ACK_TOKEN) => {
                Ok(Acknowledged { response: text })
            }
            MockReply::Text(text) => Err(ControlError::NotAcknowledged { response: text }),
            MockReply::Unreachable => Err(ControlError::Unreachable {
                addr: "mock".to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }),
        }
    }
}

/// Status feed that serves a scripted sequence of snapshots.
///
/// `None` entries produce a [`TransportError::Status`] of 503. Once the script
/// is exhausted the last entry is repeated.
#[derive(Debug, Clone, Default)]
pub struct MockStatusFeed {
    script: Arc<Mutex<VecDeque<Option<FacilitySnapshot>>>>,
    last: Arc<Mutex<Option<FacilitySnapshot>>>,
    polls: Arc<Mutex<usize>>,
}

impl MockStatusFeed {
    /// A feed that always returns `snapshot`
    pub fn fixed(snapshot: FacilitySnapshot) -> Self {
        Self::scripted([Some(snapshot)])
    }

    /// A feed that walks through `script`
    pub fn scripted(script: impl IntoIterator<Item = Option<FacilitySnapshot>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            ..Self::default()
        }
    }

    /// Number of polls served
    pub fn polls(&self) -> usize {
        *lock(&self.polls)
    }
}

#[async_trait]
impl StatusFeed for MockStatusFeed {
    async fn fetch_snapshot(&self) -> Result<FacilitySnapshot, TransportError> {
        *lock(&self.polls) += 1;

        let next = lock(&self.script).pop_front();
        let current = match next {
            Some(entry) => {
                *lock(&self.last) = entry.clone();
                entry
            }
            None => lock(&self.last).clone(),
        };

        current.ok_or(TransportError::Status(503))
    }
}
