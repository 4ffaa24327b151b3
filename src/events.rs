//! Outbound event bus — core → UI surface notifications.
//!
//! Publishing never fails: a notification with nobody listening is a valid,
//! silent outcome (the popup may simply be closed). Subscribers that fall
//! behind miss events rather than blocking the core.

use serde_json::json;
use tokio::sync::broadcast;

/// Events the core publishes toward whatever UI surface is attached.
#[derive(Debug, Clone)]
pub enum Event {
    /// A cropped screenshot was produced and delivered to the host.
    ScreenshotTaken { image_data: String },
    /// The channel to the native host went away, with an optional cause.
    NativeHostDisconnected { error: Option<String> },
    /// The channel could not be opened or a send failed.
    NativeHostError { error: String },
    /// An arbitrary message from the host, forwarded opaquely.
    BackendMessage { payload: serde_json::Value },
}

impl Event {
    /// Wire envelope for this event, matching the extension protocol.
    pub fn to_envelope(&self) -> serde_json::Value {
        match self {
            Event::ScreenshotTaken { image_data } => json!({
                "type": "screenshot_taken",
                "imageData": image_data,
            }),
            Event::NativeHostDisconnected { error } => json!({
                "type": "native_host_disconnected",
                "error": error,
            }),
            Event::NativeHostError { error } => json!({
                "type": "native_host_error",
                "error": error,
            }),
            Event::BackendMessage { payload } => json!({
                "type": "native_message",
                "payload": payload,
            }),
        }
    }
}

/// Broadcast-backed publish/subscribe bus.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Publish an event. No subscribers is not an error.
    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
