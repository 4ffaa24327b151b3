//! Session state machine — owns the one channel to the native host.
//!
//! All session state (channel handle, processing flag, last cropped image,
//! UI attachment) lives here and is mutated only through these methods.
//! Each channel gets an identity (`epoch`); completions and inbound events
//! carrying a stale epoch are dropped, so a late callback can never clobber
//! the state of a newer channel.

use serde::Serialize;
use tokio::sync::mpsc;

use super::channel::{ChannelConnector, ChannelEvent, ChannelTransport};
use crate::events::{Event, EventBus};

/// Read-only view answered to `get_status`, in the original wire shape.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    #[serde(rename = "isProcessing")]
    pub processing: bool,
    #[serde(rename = "lastImageData")]
    pub last_image: Option<String>,
    #[serde(rename = "isConnected")]
    pub connected: bool,
}

pub struct SessionController {
    connector: Box<dyn ChannelConnector>,
    events: EventBus,
    channel: Option<Box<dyn ChannelTransport>>,
    /// Channel identity. Bumped on every connect and teardown.
    epoch: u64,
    backend_tx: mpsc::Sender<(u64, ChannelEvent)>,
    processing: bool,
    last_image: Option<String>,
    ui_attached: bool,
    /// One-shot automatic reconnect latch; re-armed by the UI surface.
    auto_reconnect_spent: bool,
}

impl SessionController {
    /// Builds the controller and the receiver its backend events arrive on.
    /// The caller drives `handle_backend_event` with whatever the receiver
    /// yields.
    pub fn new(
        connector: Box<dyn ChannelConnector>,
        events: EventBus,
    ) -> (Self, mpsc::Receiver<(u64, ChannelEvent)>) {
        let (backend_tx, backend_rx) = mpsc::channel(64);
        let controller = Self {
            connector,
            events,
            channel: None,
            epoch: 0,
            backend_tx,
            processing: false,
            last_image: None,
            ui_attached: false,
            auto_reconnect_spent: false,
        };
        (controller, backend_rx)
    }

    pub fn connected(&self) -> bool {
        self.channel.is_some()
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn ui_attached(&self) -> bool {
        self.ui_attached
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            processing: self.processing,
            last_image: self.last_image.clone(),
            connected: self.connected(),
        }
    }

    /// Open the channel if it is not already open. Idempotent; failure is
    /// surfaced as a `NativeHostError` event, never a panic or an `Err`.
    pub async fn connect(&mut self) -> bool {
        if self.channel.is_some() {
            log::info!("[SESSION] Native host already connected");
            return true;
        }

        match self.connector.connect().await {
            Ok((transport, mut rx)) => {
                self.epoch += 1;
                let epoch = self.epoch;
                let tx = self.backend_tx.clone();
                // Tag everything this channel produces with its epoch so
                // stale events are recognizable after a reconnect.
                tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        if tx.send((epoch, event)).await.is_err() {
                            return;
                        }
                    }
                });
                self.channel = Some(transport);
                log::info!("[SESSION] Native host connected (epoch {})", epoch);
                true
            }
            Err(e) => {
                log::error!("[SESSION] Failed to connect to native host: {}", e);
                self.events.publish(Event::NativeHostError {
                    error: e.to_string(),
                });
                false
            }
        }
    }

    /// Re-arm the one-shot reconnect latch and try `connect()` once.
    /// This is the explicit user action behind `reconnect_native_host`.
    pub async fn reconnect(&mut self) -> bool {
        self.auto_reconnect_spent = false;
        self.connect().await
    }

    /// Close the channel and clear `processing` and `last_image`
    /// unconditionally. Safe to call when already disconnected.
    pub async fn disconnect(&mut self) {
        if let Some(mut transport) = self.channel.take() {
            log::info!("[SESSION] Disconnecting native host");
            transport.close().await;
        }
        self.epoch += 1;
        self.processing = false;
        self.last_image = None;
    }

    /// Send one envelope to the host, connecting first if necessary.
    /// A transport failure is treated as an externally triggered disconnect.
    pub async fn send(&mut self, envelope: &serde_json::Value) -> bool {
        if self.channel.is_none() && !self.connect().await {
            // connect() already surfaced the error
            return false;
        }
        let issued = self.epoch;
        let Some(transport) = self.channel.as_mut() else {
            return false;
        };

        match transport.send(envelope).await {
            Ok(()) => {
                if self.epoch != issued {
                    log::info!("[SESSION] Dropping completion for superseded channel");
                    return false;
                }
                true
            }
            Err(e) => {
                log::error!("[SESSION] Send to native host failed: {}", e);
                if self.epoch == issued {
                    self.teardown();
                }
                self.events.publish(Event::NativeHostError {
                    error: e.to_string(),
                });
                false
            }
        }
    }

    /// Record a delivered cropped image. Called only after a successful
    /// `image_data` send.
    pub fn record_image(&mut self, image_data: String) {
        self.last_image = Some(image_data);
        self.processing = true;
    }

    /// Clear `processing` and `last_image` for the next question.
    /// The channel is untouched.
    pub fn reset(&mut self) {
        log::info!("[SESSION] Resetting state for next question");
        self.processing = false;
        self.last_image = None;
    }

    pub fn on_ui_attached(&mut self) {
        log::info!("[SESSION] UI surface attached");
        self.ui_attached = true;
        self.auto_reconnect_spent = false;
    }

    /// UI detach while idle tears the session down; detach while the host
    /// is processing leaves the channel and image alone so the user can
    /// close the popup without losing the session.
    pub async fn on_ui_detached(&mut self) {
        log::info!("[SESSION] UI surface detached");
        self.ui_attached = false;
        if self.processing {
            log::info!("[SESSION] Processing in flight — keeping channel alive");
        } else {
            self.disconnect().await;
        }
    }

    /// Apply one epoch-tagged event from the backend receiver.
    pub async fn handle_backend_event(&mut self, epoch: u64, event: ChannelEvent) {
        if epoch != self.epoch {
            log::debug!(
                "[SESSION] Dropping event from stale channel (epoch {} != {})",
                epoch,
                self.epoch
            );
            return;
        }
        match event {
            ChannelEvent::Message(payload) => {
                self.events.publish(Event::BackendMessage { payload });
            }
            ChannelEvent::Closed { error } => {
                log::warn!(
                    "[SESSION] Native host disconnected: {}",
                    error.as_deref().unwrap_or("no error")
                );
                self.teardown();
                self.events
                    .publish(Event::NativeHostDisconnected { error });

                if self.auto_reconnect_spent {
                    log::warn!(
                        "[SESSION] Host dropped twice — waiting for explicit reconnect"
                    );
                } else {
                    self.auto_reconnect_spent = true;
                    log::info!("[SESSION] Attempting one-shot automatic reconnect");
                    let _ = self.connect().await;
                }
            }
        }
    }

    /// Cleanup shared by external disconnects and failed sends.
    fn teardown(&mut self) {
        self.channel = None;
        self.epoch += 1;
        self.processing = false;
        self.last_image = None;
    }
}
