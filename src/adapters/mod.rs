//! Peer adapter implementations
//!
//! This module contains implementations of the [`ControlLink`] trait used to
//! command the scouting DAQ, plus scripted doubles for tests.

pub mod control_link;
pub mod mock;

pub use control_link::{
    Acknowledged, ControlCommand, ControlLink, TcpControlLink, TcpControlLinkBuilder,
    ACK_TOKEN, RESPONSE_BUFFER_SIZE,
};
pub use mock::{MockControlLink, MockReply, MockStatusFeed};
