//! Single inbound dispatch point for typed envelopes from any UI surface.
//!
//! The tag set is closed: a `#[serde(tag = "type")]` enum, not string
//! branching. Unknown tags — and payloads that do not parse — are ignored
//! with no response; that is the forward-compatibility contract, not an
//! error. Per tag the response is either synchronous (acks, status) or
//! deferred until the capture transaction resolves.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::capture::{CaptureCoordinator, SelectionOutcome, SelectionRect, SurfaceTarget};
use crate::session::{SessionController, SessionSnapshot};

/// The closed set of inbound message tags.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Inbound {
    StartScreenshot { url: String },
    CaptureArea {
        rect: SelectionRect,
        #[serde(default)]
        dpr: Option<f64>,
    },
    MuteMic,
    UnmuteMic,
    InterruptPlayback,
    StopNativeHost,
    ResetState,
    ReconnectNativeHost,
    GetStatus,
}

/// Responses in the original wire shapes.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Response {
    Ack {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Status(SessionSnapshot),
}

impl Response {
    fn ok() -> Self {
        Response::Ack {
            success: true,
            error: None,
        }
    }

    fn fail(error: impl ToString) -> Self {
        Response::Ack {
            success: false,
            error: Some(error.to_string()),
        }
    }
}

pub struct MessageRouter {
    session: SessionController,
    coordinator: CaptureCoordinator,
}

impl MessageRouter {
    pub fn new(session: SessionController, coordinator: CaptureCoordinator) -> Self {
        Self {
            session,
            coordinator,
        }
    }

    /// The shell drives UI lifecycle and backend events through the session.
    pub fn session_mut(&mut self) -> &mut SessionController {
        &mut self.session
    }

    /// Dispatch one raw envelope. `None` means the envelope was ignored
    /// (unknown tag or unparsable payload) and no response must be sent.
    pub async fn dispatch(&mut self, raw: &serde_json::Value) -> Option<Response> {
        let inbound: Inbound = match serde_json::from_value(raw.clone()) {
            Ok(message) => message,
            Err(e) => {
                log::debug!("[ROUTER] Ignoring envelope: {}", e);
                return None;
            }
        };
        log::info!("[ROUTER] Dispatching {}", tag_of(&inbound));

        let response = match inbound {
            Inbound::StartScreenshot { url } => {
                match self.coordinator.begin_capture(&SurfaceTarget { url }) {
                    Err(e) => Response::fail(e),
                    Ok(()) => {
                        // The host must be reachable before the overlay goes up.
                        if self.session.connect().await {
                            Response::ok()
                        } else {
                            self.coordinator.cancel();
                            Response::fail("Failed to connect to native host")
                        }
                    }
                }
            }

            Inbound::CaptureArea { rect, dpr } => {
                let dpr = dpr.unwrap_or(1.0);
                match self
                    .coordinator
                    .complete_selection(rect, dpr, &mut self.session)
                    .await
                {
                    // A too-small drag is a cancellation, not a failure.
                    Ok(SelectionOutcome::Cancelled) => Response::ok(),
                    Ok(SelectionOutcome::Captured { .. }) => Response::ok(),
                    Err(e) => Response::fail(e),
                }
            }

            Inbound::MuteMic => self.forward("mute_mic").await,
            Inbound::UnmuteMic => self.forward("unmute_mic").await,
            Inbound::InterruptPlayback => self.forward("interrupt_playback").await,

            Inbound::StopNativeHost => {
                self.session.disconnect().await;
                Response::ok()
            }

            Inbound::ResetState => {
                self.session.reset();
                Response::ok()
            }

            Inbound::ReconnectNativeHost => Response::Ack {
                success: self.session.reconnect().await,
                error: None,
            },

            Inbound::GetStatus => Response::Status(self.session.snapshot()),
        };
        Some(response)
    }

    /// Forwarding tags are acked as soon as the send is queued; delivery
    /// confirmation is not awaited on behalf of the caller, and failures
    /// surface through the event bus.
    async fn forward(&mut self, tag: &str) -> Response {
        let _ = self.session.send(&json!({ "type": tag })).await;
        Response::ok()
    }
}

fn tag_of(inbound: &Inbound) -> &'static str {
    match inbound {
        Inbound::StartScreenshot { .. } => "start_screenshot",
        Inbound::CaptureArea { .. } => "capture_area",
        Inbound::MuteMic => "mute_mic",
        Inbound::UnmuteMic => "unmute_mic",
        Inbound::InterruptPlayback => "interrupt_playback",
        Inbound::StopNativeHost => "stop_native_host",
        Inbound::ResetState => "reset_state",
        Inbound::ReconnectNativeHost => "reconnect_native_host",
        Inbound::GetStatus => "get_status",
    }
}
