//! Stdio shell — adapts stdin/stdout as the UI surface.
//!
//! One JSON envelope per stdin line goes through the router; responses and
//! published events come back as JSON lines on stdout. stdin EOF is the UI
//! surface detaching: the shell exits once the session is idle, but keeps
//! serving the host channel while processing is in flight.

use tokio::io::{AsyncBufReadExt, BufReader};

use tutor_relay::capture::{CaptureCoordinator, ScreenFrameSource};
use tutor_relay::config::HostConfig;
use tutor_relay::events::EventBus;
use tutor_relay::router::MessageRouter;
use tutor_relay::session::{NativeHostConnector, SessionController};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let config = match HostConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("[SHELL] {}", e);
            std::process::exit(1);
        }
    };

    let events = EventBus::new(64);
    let mut ui_events = events.subscribe();

    let connector = NativeHostConnector::new(config);
    let (session, mut backend_rx) = SessionController::new(Box::new(connector), events.clone());
    let coordinator = CaptureCoordinator::new(Box::new(ScreenFrameSource), events);
    let mut router = MessageRouter::new(session, coordinator);

    router.session_mut().on_ui_attached();
    log::info!("[SHELL] Ready — reading envelopes from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ui_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if ui_open => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<serde_json::Value>(line) {
                        Ok(raw) => {
                            if let Some(response) = router.dispatch(&raw).await {
                                match serde_json::to_string(&response) {
                                    Ok(out) => println!("{}", out),
                                    Err(e) => log::error!("[SHELL] Response encode failed: {}", e),
                                }
                            }
                        }
                        Err(e) => log::warn!("[SHELL] Dropping non-JSON input line: {}", e),
                    }
                }
                Ok(None) | Err(_) => {
                    ui_open = false;
                    router.session_mut().on_ui_detached().await;
                    if !router.session_mut().connected() {
                        break;
                    }
                    log::info!("[SHELL] UI gone, holding session until host finishes");
                }
            },

            backend = backend_rx.recv() => match backend {
                Some((epoch, event)) => {
                    router.session_mut().handle_backend_event(epoch, event).await;
                    if !ui_open && !router.session_mut().is_processing() {
                        router.session_mut().disconnect().await;
                        break;
                    }
                }
                None => break,
            },

            event = ui_events.recv() => {
                if let Ok(event) = event {
                    if ui_open {
                        println!("{}", event.to_envelope());
                    }
                }
            }
        }
    }

    log::info!("[SHELL] Exiting");
}
