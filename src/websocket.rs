use axum::{
    extract::{ws::Message, State, WebSocketUpgrade},
    response::Response,
};
use axum::extract::ws::WebSocket;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use crate::conversation::TranslationSession;
use crate::handlers::{self, WebSocketSend};
use crate::state::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_uid = state.generate_client_uid();
    info!("New WebSocket connection: {}", client_uid);

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let session = Arc::new(TranslationSession::new(state.translator.clone(), events_tx));
    state.sessions.insert(client_uid.clone(), session.clone());

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (out_tx, mut out_rx): (WebSocketSend, _) = mpsc::unbounded_channel();

    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if let Err(e) = ws_sender.send(Message::Text(text)).await {
                error!("Failed to send message: {}", e);
                break;
            }
        }
    });

    // Push log snapshots, session events and connectivity changes to the client
    let mut updates = session.subscribe().await;
    let mut connectivity = state.connectivity.clone();
    let forward_tx = out_tx.clone();
    let forward_session = session.clone();
    let forwarder = tokio::spawn(async move {
        let status = *connectivity.borrow_and_update();
        let _ = forward_tx.send(handlers::connectivity_message(status).to_string());
        let _ = forward_tx.send(
            handlers::history_message(&forward_session.snapshot().await).to_string(),
        );

        loop {
            let msg = tokio::select! {
                update = updates.recv() => match update {
                    Ok(entries) => handlers::history_message(&entries),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Client lagged {} history updates", skipped);
                        handlers::history_message(&forward_session.snapshot().await)
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(event) = events_rx.recv() => handlers::event_message(&event),
                Ok(()) = connectivity.changed() => {
                    let status = *connectivity.borrow_and_update();
                    handlers::connectivity_message(status)
                }
            };
            if forward_tx.send(msg.to_string()).is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Err(e) =
                    handlers::handle_message(&state, &session, &client_uid, &text, &out_tx).await
                {
                    error!("Error handling message: {}", e);
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {} disconnected", client_uid);
                break;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    // Cleanup
    session.cancel().await;
    state.sessions.remove(&client_uid);
    forwarder.abort();
    writer.abort();

    info!("Cleaned up client {}", client_uid);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ConnectivityConfig, SystemConfig, TranslationConfig};
    use crate::connectivity::ConnectivityStatus;
    use crate::conversation::log::EntryStatus;
    use crate::conversation::session::CANCELLED_NOTICE;
    use crate::translate::{
        TranslateError, TranslationClient, TranslationData, TranslationRequest,
    };
    use async_trait::async_trait;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::{watch, Notify};
    use tokio_tungstenite::{
        connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
    };

    type TestSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

    struct FakeClient {
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl TranslationClient for FakeClient {
        async fn translate(
            &self,
            _request: &TranslationRequest,
        ) -> Result<TranslationData, TranslateError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(TranslationData {
                translated_text: "Ẹ káàárọ̀".to_string(),
                detected_language: None,
                confidence: None,
            })
        }
    }

    fn test_state(
        client: FakeClient,
    ) -> (AppState, watch::Sender<ConnectivityStatus>) {
        let config = Config {
            system_config: SystemConfig::default(),
            translation_config: TranslationConfig::default(),
            connectivity_config: ConnectivityConfig::default(),
        };
        let (status_tx, status_rx) = watch::channel(ConnectivityStatus::Online);
        (AppState::with_parts(config, Arc::new(client), status_rx), status_tx)
    }

    async fn serve(state: AppState) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new()
            .merge(crate::routes::create_routes())
            .with_state(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("ws://{}/client-ws", addr)
    }

    async fn next_frame(socket: &mut TestSocket) -> Value {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("socket closed")
                .unwrap();
            if let WsMessage::Text(text) = msg {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    async fn connect(url: &str) -> TestSocket {
        let (mut socket, _) = connect_async(url).await.unwrap();

        let status = next_frame(&mut socket).await;
        assert_eq!(status["type"], "connectivity");
        assert_eq!(status["status"], "online");
        let history = next_frame(&mut socket).await;
        assert_eq!(history["type"], "history");
        assert_eq!(history["entries"], json!([]));

        socket
    }

    async fn send_text(socket: &mut TestSocket, text: &str) {
        socket
            .send(WsMessage::Text(
                json!({ "type": "text-input", "text": text }).to_string(),
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn turn_produces_history_and_control_frames() {
        let (state, _status_tx) = test_state(FakeClient { gate: None });
        let url = serve(state).await;
        let mut socket = connect(&url).await;

        send_text(&mut socket, "Good morning!").await;

        let mut histories = Vec::new();
        let mut controls = Vec::new();
        let mut completed = None;
        while completed.is_none() || histories.len() < 3 {
            let frame = next_frame(&mut socket).await;
            match frame["type"].as_str() {
                Some("history") => histories.push(frame["entries"].clone()),
                Some("control") => controls.push(frame),
                Some("translation-complete") => {
                    // Completion always follows the end-of-sending signal
                    assert_eq!(controls.len(), 2);
                    completed = Some(frame["text"].clone());
                }
                other => panic!("unexpected frame type {:?}", other),
            }
        }

        // One frame per log mutation: user entry, placeholder, resolution
        assert_eq!(histories.len(), 3);
        assert_eq!(histories[0].as_array().unwrap().len(), 1);
        assert_eq!(histories[0][0]["content"], "Good morning!");
        assert_eq!(histories[1][1]["is_placeholder"], true);
        assert_eq!(histories[2][1]["content"], "Ẹ káàárọ̀");
        assert_eq!(histories[2][1]["status"], "success");
        assert_eq!(histories[2][1]["is_placeholder"], false);

        assert_eq!(controls[0]["text"], "sending-start");
        assert_eq!(controls[1]["text"], "sending-end");
        assert_eq!(controls[1]["outcome"], "success");
        assert_eq!(controls[0]["turn"], controls[1]["turn"]);
        assert_eq!(completed, Some(json!("Ẹ káàárọ̀")));
    }

    #[tokio::test]
    async fn disconnect_cancels_in_flight_turn() {
        let (state, _status_tx) = test_state(FakeClient {
            gate: Some(Arc::new(Notify::new())),
        });
        let url = serve(state.clone()).await;
        let mut socket = connect(&url).await;

        send_text(&mut socket, "Good night").await;
        loop {
            let frame = next_frame(&mut socket).await;
            if frame["type"] == "control" && frame["text"] == "sending-start" {
                break;
            }
        }

        let session = state
            .sessions
            .iter()
            .next()
            .map(|e| e.value().clone())
            .unwrap();
        assert!(session.is_in_flight().await);

        socket.close(None).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !state.sessions.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("session was not cleaned up");

        assert!(!session.is_in_flight().await);
        let entries = session.snapshot().await;
        let last = entries.last().unwrap();
        assert_eq!(last.status, EntryStatus::Cancelled);
        assert_eq!(last.content, CANCELLED_NOTICE);
        assert!(!last.is_placeholder);
    }

    #[tokio::test]
    async fn connectivity_changes_are_pushed() {
        let (state, status_tx) = test_state(FakeClient { gate: None });
        let url = serve(state).await;
        let mut socket = connect(&url).await;

        status_tx.send(ConnectivityStatus::Offline).unwrap();
        let frame = next_frame(&mut socket).await;
        assert_eq!(frame["type"], "connectivity");
        assert_eq!(frame["status"], "offline");
    }
}
