//! Observer WebSocket: backlog on connect, then every broadcast event.
//! Observers may inject questions.

use crate::server::{spawn_question, AppState};
use archivefever_core::{ObserverMessage, StreamEvent};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub async fn handle_observer(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Subscribe before reading the backlog so nothing falls in between.
    let mut events = state.broadcaster.subscribe();
    info!("Observer connected ({} total)", state.broadcaster.observer_count());

    let backlog = match state.store.recent_thoughts(state.initial_stream_len, 0).await {
        Ok(thoughts) => thoughts,
        Err(e) => {
            warn!("Could not load backlog for observer: {}", e);
            Vec::new()
        }
    };
    if let Ok(json) = serde_json::to_string(&StreamEvent::InitialStream(backlog)) {
        if ws_tx.send(WsMessage::Text(json)).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => handle_text(&text, &state),
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!("Observer disconnected");
                        return;
                    }
                    Some(Err(e)) => {
                        warn!("Observer socket error: {}", e);
                        return;
                    }
                    _ => {}
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            if ws_tx.send(WsMessage::Text(json)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Observer lagged, dropped {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }
    }
}

fn handle_text(text: &str, state: &Arc<AppState>) {
    match serde_json::from_str::<ObserverMessage>(text) {
        Ok(ObserverMessage::InjectQuestion { question }) => {
            if let Err(e) = spawn_question(state, &question) {
                debug!("Ignored observer question: {:?}", e.0);
            }
        }
        Err(e) => warn!("Unrecognized observer message: {}", e),
    }
}
