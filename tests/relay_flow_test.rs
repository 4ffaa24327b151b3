//! Integration tests for the capture-and-relay flow.
//!
//! Drives the public API end to end with a mock host channel and a
//! synthetic frame source: router dispatch, capture transaction, crop
//! geometry, delivery failure handling, and session status.

use async_trait::async_trait;
use base64::Engine;
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde_json::json;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use tutor_relay::capture::{CaptureCoordinator, CaptureError, FrameSource};
use tutor_relay::events::{Event, EventBus};
use tutor_relay::router::{MessageRouter, Response};
use tutor_relay::session::{
    ChannelConnector, ChannelError, ChannelEvent, ChannelTransport, SessionController,
};

// ── Mocks ───────────────────────────────────────────────────────────

struct MockTransport {
    sent: Arc<Mutex<Vec<serde_json::Value>>>,
    fail_send: Arc<AtomicBool>,
}

#[async_trait]
impl ChannelTransport for MockTransport {
    async fn send(&mut self, envelope: &serde_json::Value) -> Result<(), ChannelError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(ChannelError::Transport("pipe broken".to_string()));
        }
        self.sent.lock().unwrap().push(envelope.clone());
        Ok(())
    }

    async fn close(&mut self) {}
}

#[derive(Default)]
struct MockHost {
    sent: Arc<Mutex<Vec<serde_json::Value>>>,
    fail_send: Arc<AtomicBool>,
    connects: Arc<AtomicUsize>,
}

struct MockConnector(Arc<MockHost>);

#[async_trait]
impl ChannelConnector for MockConnector {
    async fn connect(
        &self,
    ) -> Result<(Box<dyn ChannelTransport>, mpsc::Receiver<ChannelEvent>), ChannelError> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        let (_tx, rx) = mpsc::channel(8);
        Ok((
            Box::new(MockTransport {
                sent: self.0.sent.clone(),
                fail_send: self.0.fail_send.clone(),
            }),
            rx,
        ))
    }
}

struct SyntheticFrameSource {
    width: u32,
    height: u32,
    captures: Arc<AtomicUsize>,
}

#[async_trait]
impl FrameSource for SyntheticFrameSource {
    async fn capture_frame(&self) -> Result<Vec<u8>, CaptureError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        let img = DynamicImage::ImageRgba8(RgbaImage::new(self.width, self.height));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| CaptureError::EncodingFailed(e.to_string()))?;
        Ok(bytes)
    }
}

struct Harness {
    router: MessageRouter,
    host: Arc<MockHost>,
    captures: Arc<AtomicUsize>,
    events: EventBus,
}

fn harness() -> Harness {
    let events = EventBus::new(16);
    let host = Arc::new(MockHost::default());
    let captures = Arc::new(AtomicUsize::new(0));

    let (session, _backend_rx) =
        SessionController::new(Box::new(MockConnector(host.clone())), events.clone());
    let coordinator = CaptureCoordinator::new(
        Box::new(SyntheticFrameSource {
            width: 1000,
            height: 800,
            captures: captures.clone(),
        }),
        events.clone(),
    );

    Harness {
        router: MessageRouter::new(session, coordinator),
        host,
        captures,
        events,
    }
}

fn assert_ack(response: Option<Response>, expect_success: bool) -> Option<String> {
    match response {
        Some(Response::Ack { success, error }) => {
            assert_eq!(success, expect_success, "Unexpected ack outcome: {:?}", error);
            error
        }
        other => panic!("Expected ack, got {:?}", other),
    }
}

fn status(response: Option<Response>) -> serde_json::Value {
    match response {
        Some(r @ Response::Status(_)) => serde_json::to_value(r).unwrap(),
        other => panic!("Expected status, got {:?}", other),
    }
}

// ── End-to-end capture ──────────────────────────────────────────────

#[tokio::test]
async fn capture_area_crops_scaled_region_and_delivers_it() {
    let mut h = harness();
    let mut ui_events = h.events.subscribe();

    let ack = h
        .router
        .dispatch(&json!({"type": "start_screenshot", "url": "https://example.com/lesson"}))
        .await;
    assert_ack(ack, true);

    let ack = h
        .router
        .dispatch(&json!({
            "type": "capture_area",
            "rect": {"x": 100.0, "y": 200.0, "width": 300.0, "height": 150.0},
            "dpr": 2.0,
        }))
        .await;
    assert_ack(ack, true);

    // Exactly one image_data envelope went to the host
    let sent = h.host.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["type"], "image_data");

    // The cropped payload is a 600x300 PNG (every quantity scaled by dpr 2)
    let b64 = sent[0]["imageData"].as_str().unwrap();
    let png = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .unwrap();
    let img = image::load_from_memory(&png).unwrap();
    assert_eq!((img.width(), img.height()), (600, 300));

    // The UI surface was notified with the same image
    match ui_events.recv().await.unwrap() {
        Event::ScreenshotTaken { image_data } => assert_eq!(image_data, b64),
        other => panic!("Expected screenshot_taken, got {:?}", other),
    }

    // And the session now reflects an in-flight question
    let snap = status(h.router.dispatch(&json!({"type": "get_status"})).await);
    assert_eq!(snap["isProcessing"], true);
    assert_eq!(snap["isConnected"], true);
    assert_eq!(snap["lastImageData"].as_str().unwrap(), b64);
}

#[tokio::test]
async fn capture_area_defaults_dpr_to_one() {
    let mut h = harness();
    let ack = h
        .router
        .dispatch(&json!({
            "type": "capture_area",
            "rect": {"x": 0.0, "y": 0.0, "width": 40.0, "height": 30.0},
        }))
        .await;
    assert_ack(ack, true);

    let sent = h.host.sent.lock().unwrap().clone();
    let png = base64::engine::general_purpose::STANDARD
        .decode(sent[0]["imageData"].as_str().unwrap())
        .unwrap();
    let img = image::load_from_memory(&png).unwrap();
    assert_eq!((img.width(), img.height()), (40, 30));
}

// ── Selection threshold ─────────────────────────────────────────────

#[tokio::test]
async fn selection_of_width_five_is_cancelled_without_capture() {
    let mut h = harness();
    let ack = h
        .router
        .dispatch(&json!({
            "type": "capture_area",
            "rect": {"x": 10.0, "y": 10.0, "width": 5.0, "height": 100.0},
            "dpr": 2.0,
        }))
        .await;
    // Cancellation is a normal outcome, not a failure
    assert_ack(ack, true);
    assert_eq!(h.captures.load(Ordering::SeqCst), 0);
    assert!(h.host.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn selection_of_width_six_proceeds() {
    let mut h = harness();
    let ack = h
        .router
        .dispatch(&json!({
            "type": "capture_area",
            "rect": {"x": 10.0, "y": 10.0, "width": 6.0, "height": 100.0},
        }))
        .await;
    assert_ack(ack, true);
    assert_eq!(h.captures.load(Ordering::SeqCst), 1);
    assert_eq!(h.host.sent.lock().unwrap().len(), 1);
}

// ── Delivery failure ────────────────────────────────────────────────

#[tokio::test]
async fn delivery_failure_discards_the_image() {
    let mut h = harness();
    h.host.fail_send.store(true, Ordering::SeqCst);

    let error = assert_ack(
        h.router
            .dispatch(&json!({
                "type": "capture_area",
                "rect": {"x": 0.0, "y": 0.0, "width": 100.0, "height": 100.0},
            }))
            .await,
        false,
    );
    assert!(error.unwrap().contains("Delivery failed"));

    // No preview the host never received: lastImage stays unset
    let snap = status(h.router.dispatch(&json!({"type": "get_status"})).await);
    assert_eq!(snap["lastImageData"], serde_json::Value::Null);
    assert_eq!(snap["isProcessing"], false);
}

// ── Session control tags ────────────────────────────────────────────

#[tokio::test]
async fn forwarding_tags_reach_the_host_verbatim() {
    let mut h = harness();
    for tag in ["mute_mic", "unmute_mic", "interrupt_playback"] {
        assert_ack(h.router.dispatch(&json!({"type": tag})).await, true);
    }
    let sent = h.host.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0], json!({"type": "mute_mic"}));
    assert_eq!(sent[2], json!({"type": "interrupt_playback"}));
}

#[tokio::test]
async fn reset_state_never_alters_connected() {
    let mut h = harness();
    assert_ack(
        h.router.dispatch(&json!({"type": "reconnect_native_host"})).await,
        true,
    );
    assert_ack(h.router.dispatch(&json!({"type": "reset_state"})).await, true);

    let snap = status(h.router.dispatch(&json!({"type": "get_status"})).await);
    assert_eq!(snap["isConnected"], true);
    assert_eq!(snap["isProcessing"], false);
    assert_eq!(snap["lastImageData"], serde_json::Value::Null);
}

#[tokio::test]
async fn stop_native_host_tears_down_everything() {
    let mut h = harness();
    assert_ack(
        h.router
            .dispatch(&json!({
                "type": "capture_area",
                "rect": {"x": 0.0, "y": 0.0, "width": 50.0, "height": 50.0},
            }))
            .await,
        true,
    );
    assert_ack(
        h.router.dispatch(&json!({"type": "stop_native_host"})).await,
        true,
    );

    let snap = status(h.router.dispatch(&json!({"type": "get_status"})).await);
    assert_eq!(snap["isConnected"], false);
    assert_eq!(snap["isProcessing"], false);
    assert_eq!(snap["lastImageData"], serde_json::Value::Null);
}

#[tokio::test]
async fn reconnect_after_stop_opens_a_fresh_channel() {
    let mut h = harness();
    assert_ack(
        h.router.dispatch(&json!({"type": "reconnect_native_host"})).await,
        true,
    );
    assert_ack(
        h.router.dispatch(&json!({"type": "stop_native_host"})).await,
        true,
    );
    assert_ack(
        h.router.dispatch(&json!({"type": "reconnect_native_host"})).await,
        true,
    );
    assert_eq!(h.host.connects.load(Ordering::SeqCst), 2);
}
