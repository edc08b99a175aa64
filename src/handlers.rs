use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::connectivity::ConnectivityStatus;
use crate::conversation::{ChatEntry, SessionEvent, TranslationSession};
use crate::state::AppState;

/// Outbound text frames for one WebSocket client
pub type WebSocketSend = mpsc::UnboundedSender<String>;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    TextInput {
        text: String,
        #[serde(default)]
        source_language: Option<String>,
        #[serde(default)]
        target_language: Option<String>,
    },
    InterruptSignal,
    FetchHistory,
}

pub async fn handle_message(
    state: &AppState,
    session: &TranslationSession,
    client_uid: &str,
    text: &str,
    sender: &WebSocketSend,
) -> anyhow::Result<()> {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Unreadable message from {}: {}", client_uid, e);
            send(sender, error_message(&format!("Invalid message: {}", e)));
            return Ok(());
        }
    };

    match msg {
        ClientMessage::TextInput {
            text,
            source_language,
            target_language,
        } => {
            let defaults = &state.config.translation_config;
            let source = source_language.unwrap_or_else(|| defaults.source_language.clone());
            let target = target_language.unwrap_or_else(|| defaults.target_language.clone());
            if let Err(e) = session.submit(&text, &source, &target).await {
                debug!("Rejected input from {}: {}", client_uid, e);
                send(sender, error_message(&e.to_string()));
            }
        }
        ClientMessage::InterruptSignal => {
            session.cancel().await;
        }
        ClientMessage::FetchHistory => {
            send(sender, history_message(&session.snapshot().await));
        }
    }

    Ok(())
}

fn send(sender: &WebSocketSend, msg: Value) {
    let _ = sender.send(msg.to_string());
}

pub fn history_message(entries: &[ChatEntry]) -> Value {
    json!({
        "type": "history",
        "entries": entries
    })
}

pub fn event_message(event: &SessionEvent) -> Value {
    match event {
        SessionEvent::SendingStarted { turn } => json!({
            "type": "control",
            "text": "sending-start",
            "turn": turn
        }),
        SessionEvent::SendingEnded { turn, outcome } => json!({
            "type": "control",
            "text": "sending-end",
            "turn": turn,
            "outcome": outcome
        }),
        SessionEvent::Completed {
            turn,
            translated_text,
        } => json!({
            "type": "translation-complete",
            "turn": turn,
            "text": translated_text
        }),
    }
}

pub fn connectivity_message(status: ConnectivityStatus) -> Value {
    json!({
        "type": "connectivity",
        "status": status
    })
}

pub fn error_message(message: &str) -> Value {
    json!({
        "type": "error",
        "message": message
    })
}
