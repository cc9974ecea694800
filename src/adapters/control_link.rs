//! TCP control link to the scouting DAQ
//!
//! The scouting peer accepts one plain-text command per connection and answers
//! with a short text reply:
//!
//! | Direction | Payload | Meaning |
//! |---|---|---|
//! | client→peer | `start <run>` | begin scouting for `run` |
//! | client→peer | `stop` | end scouting |
//! | peer→client | text containing `ok` | acknowledged |
//! | peer→client | anything else, nothing, timeout | not acknowledged |
//!
//! A fresh connection is opened for every command and dropped before
//! [`ControlLink::send`] returns, whatever the outcome.

use crate::config::PeerConfig;
use crate::error::ControlError;
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Maximum number of reply bytes read from the peer.
pub const RESPONSE_BUFFER_SIZE: usize = 256;

/// Substring marking a reply as acknowledged.
pub const ACK_TOKEN: &str = "ok";

/// A command for the scouting peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Begin scouting for the given run
    Start(u64),
    /// End scouting
    Stop,
}

impl ControlCommand {
    /// Parse a command as the peer does: tokens split on spaces or commas.
    ///
    /// Returns `None` for unknown verbs, wrong arity, or a non-numeric run.
    pub fn parse(input: &str) -> Option<Self> {
        let items: Vec<&str> = input
            .split(|c: char| c == ' ' || c == ',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        match items.as_slice() {
            ["start", run] => run.parse().ok().map(ControlCommand::Start),
            ["stop"] => Some(ControlCommand::Stop),
            _ => None,
        }
    }

    /// Run number carried by the command, if any
    pub fn run_number(&self) -> Option<u64> {
        match self {
            ControlCommand::Start(run) => Some(*run),
            ControlCommand::Stop => None,
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCommand::Start(run) => write!(f, "start {run}"),
            ControlCommand::Stop => f.write_str("stop"),
        }
    }
}

/// Positive reply from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledged {
    /// Raw reply text
    pub response: String,
}

/// One command/response exchange with the scouting peer.
#[async_trait]
pub trait ControlLink: Send + Sync {
    /// Deliver `command` and wait for the peer's verdict.
    async fn send(&self, command: ControlCommand) -> Result<Acknowledged, ControlError>;
}

/// Builder for [`TcpControlLink`]
///
/// Default configuration:
/// * connect_timeout: 5 seconds
/// * read_timeout: 5 seconds
#[derive(Debug, Clone)]
pub struct TcpControlLinkBuilder {
    host: String,
    port: u16,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl TcpControlLinkBuilder {
    /// Create a new builder for `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
        }
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the timeout for writing the command and reading the reply
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Build the link
    pub fn build(self) -> TcpControlLink {
        TcpControlLink {
            addr: format!("{}:{}", self.host, self.port),
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
        }
    }
}

/// Control link over short-lived TCP connections.
#[derive(Debug, Clone)]
pub struct TcpControlLink {
    addr: String,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl TcpControlLink {
    /// Create a link from the peer configuration
    pub fn new(config: &PeerConfig) -> Self {
        TcpControlLinkBuilder::new(config.host.clone(), config.port)
            .with_connect_timeout(config.connect_timeout)
            .with_read_timeout(config.read_timeout)
            .build()
    }

    /// `host:port` of the peer
    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn unreachable(&self, source: io::Error) -> ControlError {
        ControlError::Unreachable {
            addr: self.addr.clone(),
            source,
        }
    }

    async fn connect(&self) -> Result<TcpStream, ControlError> {
        match timeout(self.connect_timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(self.unreachable(e)),
            Err(_) => Err(self.unreachable(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect timed out after {:?}", self.connect_timeout),
            ))),
        }
    }
}

#[async_trait]
impl ControlLink for TcpControlLink {
    async fn send(&self, command: ControlCommand) -> Result<Acknowledged, ControlError> {
        let mut stream = self.connect().await?;
        let message = command.to_string();

        debug!(peer = %self.addr, command = %message, "Sending control command");

        let exchange = async {
            stream.write_all(message.as_bytes()).await?;
            let mut buffer = [0u8; RESPONSE_BUFFER_SIZE];
            let read = stream.read(&mut buffer).await?;
            Ok::<_, io::Error>(String::from_utf8_lossy(&buffer[..read]).into_owned())
        };

        // `stream` is dropped, and the socket closed, on every return below.
        let response = match timeout(self.read_timeout, exchange).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(self.unreachable(e)),
            Err(_) => {
                return Err(ControlError::NotAcknowledged {
                    response: String::new(),
                })
            }
        };

        debug!(peer = %self.addr, response = %response.trim(), "Peer response");

        if response.contains(ACK_TOKEN) {
            Ok(Acknowledged { response })
        } else {
            Err(ControlError::NotAcknowledged { response })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accept one connection, record what was sent, reply with `reply`.
    async fn one_shot_peer(reply: impl Into<String>) -> (u16, tokio::task::JoinHandle<String>) {
        let reply = reply.into();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(reply.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });
        (port, handle)
    }

    fn link(port: u16) -> TcpControlLink {
        TcpControlLinkBuilder::new("127.0.0.1", port)
            .with_connect_timeout(Duration::from_millis(500))
            .with_read_timeout(Duration::from_millis(300))
            .build()
    }

    #[test]
    fn test_command_wire_format() {
        assert_eq!(ControlCommand::Start(123).to_string(), "start 123");
        assert_eq!(ControlCommand::Stop.to_string(), "stop");
    }

    #[test]
    fn test_parse_peer_grammar() {
        assert_eq!(ControlCommand::parse("start 42"), Some(ControlCommand::Start(42)));
        assert_eq!(ControlCommand::parse("start,42"), Some(ControlCommand::Start(42)));
        assert_eq!(ControlCommand::parse("stop\n"), Some(ControlCommand::Stop));
        assert_eq!(ControlCommand::parse("start"), None);
        assert_eq!(ControlCommand::parse("start abc"), None);
        assert_eq!(ControlCommand::parse("stop 1"), None);
        assert_eq!(ControlCommand::parse("pause"), None);
    }

    #[test]
    fn test_run_number() {
        assert_eq!(ControlCommand::Start(9).run_number(), Some(9));
        assert_eq!(ControlCommand::Stop.run_number(), None);
    }

    #[tokio::test]
    async fn test_start_acknowledged() {
        let (port, peer) = one_shot_peer("ok").await;

        let ack = link(port).send(ControlCommand::Start(123)).await.unwrap();
        assert_eq!(ack.response, "ok");
        assert_eq!(peer.await.unwrap(), "start 123");
    }

    #[tokio::test]
    async fn test_ignored_is_not_acknowledged() {
        let (port, peer) = one_shot_peer("ignored").await;

        let err = link(port).send(ControlCommand::Stop).await.unwrap_err();
        assert!(matches!(err, ControlError::NotAcknowledged { ref response } if response == "ignored"));
        assert_eq!(peer.await.unwrap(), "stop");
    }

    #[tokio::test]
    async fn test_silent_peer_times_out_as_not_acknowledged() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _peer = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(socket);
        });

        let err = link(port).send(ControlCommand::Stop).await.unwrap_err();
        assert!(matches!(err, ControlError::NotAcknowledged { ref response } if response.is_empty()));
    }

    #[tokio::test]
    async fn test_closed_without_reply_is_not_acknowledged() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _peer = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let _ = socket.read(&mut buf).await;
            let _ = socket.shutdown().await;
        });

        let err = link(port).send(ControlCommand::Start(7)).await.unwrap_err();
        assert!(matches!(err, ControlError::NotAcknowledged { .. }));
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = link(port).send(ControlCommand::Start(1)).await.unwrap_err();
        assert!(matches!(err, ControlError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_reset_connection_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _peer = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let _ = socket.read(&mut buf).await;
            // Zero linger turns the close into a reset
            #[allow(deprecated)]
            socket.set_linger(Some(Duration::ZERO)).unwrap();
            drop(socket);
        });

        let err = link(port).send(ControlCommand::Start(5)).await.unwrap_err();
        assert!(matches!(err, ControlError::Unreachable { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_connect_timeout_is_unreachable() {
        // Non-routable: the SYN is never answered, or the network refuses outright
        let link = TcpControlLinkBuilder::new("10.255.255.1", 8000)
            .with_connect_timeout(Duration::from_millis(100))
            .build();

        let started = std::time::Instant::now();
        let err = link.send(ControlCommand::Stop).await.unwrap_err();

        assert!(matches!(err, ControlError::Unreachable { ref addr, .. } if addr == "10.255.255.1:8000"));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_ack_past_buffer_is_ignored() {
        let reply = format!("{}{}", "x".repeat(300), ACK_TOKEN);
        let (port, _peer) = one_shot_peer(reply).await;

        let err = link(port).send(ControlCommand::Start(3)).await.unwrap_err();
        match err {
            ControlError::NotAcknowledged { response } => {
                assert!(response.len() <= RESPONSE_BUFFER_SIZE);
                assert!(!response.contains(ACK_TOKEN));
            }
            other => panic!("expected NotAcknowledged, got {other:?}"),
        }
    }
}
