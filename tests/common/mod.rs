//! Network fakes shared by the integration tests.
//!
//! - [`FakeScoutPeer`]: the scouting DAQ's run-control socket. It answers `ok`
//!   to a `start` while stopped and to a `stop` while running, `ignored`
//!   otherwise, like the real peer.
//! - [`StatusStub`]: a minimal HTTP server returning a canned status payload.

#![allow(dead_code)]

use scout_sync::ControlCommand;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Default)]
struct PeerState {
    running: bool,
    run_number: u64,
    received: Vec<String>,
}

pub struct FakeScoutPeer {
    pub port: u16,
    state: Arc<Mutex<PeerState>>,
    task: JoinHandle<()>,
}

impl FakeScoutPeer {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(PeerState::default()));

        let shared = state.clone();
        let task = tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = [0u8; 1024];
                let n = match socket.read(&mut buf).await {
                    Ok(n) if n > 0 => n,
                    _ => continue,
                };
                let input = String::from_utf8_lossy(&buf[..n]).into_owned();
                let reply = {
                    let mut state = shared.lock().unwrap();
                    state.received.push(input.clone());
                    match ControlCommand::parse(&input) {
                        Some(ControlCommand::Start(run)) if !state.running => {
                            state.running = true;
                            state.run_number = run;
                            "ok"
                        }
                        Some(ControlCommand::Stop) if state.running => {
                            state.running = false;
                            "ok"
                        }
                        Some(_) => "ignored",
                        None => "ERROR: Cannot parse input.",
                    }
                };
                let _ = socket.write_all(reply.as_bytes()).await;
            }
        });

        Self { port, state, task }
    }

    pub fn received(&self) -> Vec<String> {
        self.state.lock().unwrap().received.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    pub fn run_number(&self) -> u64 {
        self.state.lock().unwrap().run_number
    }
}

impl Drop for FakeScoutPeer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct StatusStub {
    pub port: u16,
    response: Arc<Mutex<(u16, String)>>,
    task: JoinHandle<()>,
}

impl StatusStub {
    pub async fn spawn(status: u16, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let response = Arc::new(Mutex::new((status, body.to_string())));

        let shared = response.clone();
        let task = tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let (status, body) = shared.lock().unwrap().clone();
                let reply = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self {
            port,
            response,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}/DAQSnapshotService/getsnapshot?setup=cdaq", self.port)
    }

    pub fn set(&self, status: u16, body: &str) {
        *self.response.lock().unwrap() = (status, body.to_string());
    }
}

impl Drop for StatusStub {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn snapshot_json(run: u64, beam_mode: &str, daq_state: &str) -> String {
    format!(r#"{{"runNumber": {run}, "lhcBeamMode": "{beam_mode}", "daqState": "{daq_state}", "setup": "cdaq"}}"#)
}
