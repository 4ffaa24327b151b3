//! Channel to the native host — the infrastructure layer.
//!
//! One channel = one host process. Outbound envelopes are written as
//! newline-delimited JSON records to the host's stdin; inbound records are
//! read off its stdout by a reader task and surfaced as `ChannelEvent`s.
//! EOF on stdout is the host going away.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;

use crate::config::HostConfig;

/// What a live channel can report back to the session.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// One inbound record from the host, parsed but otherwise opaque.
    Message(serde_json::Value),
    /// The host went away. Emitted exactly once per channel.
    Closed { error: Option<String> },
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to launch native host: {0}")]
    Spawn(String),

    #[error("Native host pipes unavailable: {0}")]
    MissingPipe(&'static str),

    #[error("Channel transport failed: {0}")]
    Transport(String),
}

/// Write half of a live channel.
#[async_trait]
pub trait ChannelTransport: Send {
    /// Write one envelope as a single record.
    async fn send(&mut self, envelope: &serde_json::Value) -> Result<(), ChannelError>;

    /// Release the transport. Idempotent.
    async fn close(&mut self);
}

/// Opens fresh channels. Each call yields an independent transport plus the
/// receiver its inbound events arrive on.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(
        &self,
    ) -> Result<(Box<dyn ChannelTransport>, mpsc::Receiver<ChannelEvent>), ChannelError>;
}

/// Production connector: spawns the configured host command with piped stdio.
pub struct NativeHostConnector {
    config: HostConfig,
}

impl NativeHostConnector {
    pub fn new(config: HostConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ChannelConnector for NativeHostConnector {
    async fn connect(
        &self,
    ) -> Result<(Box<dyn ChannelTransport>, mpsc::Receiver<ChannelEvent>), ChannelError> {
        log::info!("[HOST] Launching native host: {}", self.config.command);

        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| ChannelError::Spawn(e.to_string()))?;

        let stdin = child.stdin.take().ok_or(ChannelError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(ChannelError::MissingPipe("stdout"))?;

        let (tx, rx) = mpsc::channel(64);

        // Reader task: one JSON record per line until EOF.
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<serde_json::Value>(&line) {
                            Ok(value) => {
                                if tx.send(ChannelEvent::Message(value)).await.is_err() {
                                    return; // session gone, stop reading
                                }
                            }
                            Err(e) => {
                                log::warn!("[HOST] Skipping unparsable record: {}", e);
                            }
                        }
                    }
                    Ok(None) => {
                        log::info!("[HOST] Host stdout closed");
                        let _ = tx.send(ChannelEvent::Closed { error: None }).await;
                        return;
                    }
                    Err(e) => {
                        log::warn!("[HOST] Read error on host stdout: {}", e);
                        let _ = tx
                            .send(ChannelEvent::Closed {
                                error: Some(e.to_string()),
                            })
                            .await;
                        return;
                    }
                }
            }
        });

        let transport = NativeHostTransport {
            stdin: Some(stdin),
            child: Some(child),
        };
        Ok((Box::new(transport), rx))
    }
}

struct NativeHostTransport {
    stdin: Option<ChildStdin>,
    child: Option<Child>,
}

#[async_trait]
impl ChannelTransport for NativeHostTransport {
    async fn send(&mut self, envelope: &serde_json::Value) -> Result<(), ChannelError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ChannelError::Transport("stdin already closed".to_string()))?;

        let mut record =
            serde_json::to_string(envelope).map_err(|e| ChannelError::Transport(e.to_string()))?;
        record.push('\n');

        stdin
            .write_all(record.as_bytes())
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn close(&mut self) {
        // Closing stdin tells a well-behaved host to exit; the reaper task
        // collects its status so nothing is left as a zombie.
        self.stdin.take();
        if let Some(mut child) = self.child.take() {
            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) => log::info!("[HOST] Host exited: {}", status),
                    Err(e) => log::warn!("[HOST] Failed to reap host: {}", e),
                }
            });
        }
    }
}
