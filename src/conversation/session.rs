use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use super::log::{ChatEntry, ConversationLog, EntryStatus};
use crate::translate::{TranslateError, TranslationClient, TranslationData, TranslationRequest};

pub const CANCELLED_NOTICE: &str = "Translation cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnOutcome {
    Success,
    Failed,
    Cancelled,
}

/// Notifications for the caller driving the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SendingStarted { turn: u64 },
    SendingEnded { turn: u64, outcome: TurnOutcome },
    /// Fired only when a turn resolves successfully
    Completed { turn: u64, translated_text: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot translate blank input")]
    BlankInput,
}

struct ActiveRequest {
    turn: u64,
    abort: AbortHandle,
}

struct SessionInner {
    log: ConversationLog,
    active: Option<ActiveRequest>,
    last_turn: u64,
}

/// Drives one conversation: at most one translation in flight, every outcome
/// reconciled into the conversation log.
pub struct TranslationSession {
    client: Arc<dyn TranslationClient>,
    inner: Arc<Mutex<SessionInner>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl TranslationSession {
    pub fn new(
        client: Arc<dyn TranslationClient>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            client,
            inner: Arc::new(Mutex::new(SessionInner {
                log: ConversationLog::new(),
                active: None,
                last_turn: 0,
            })),
            events,
        }
    }

    /// Start a new turn, cancelling whatever turn is still in flight.
    /// Returns the turn number assigned to this submission.
    pub async fn submit(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<u64, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::BlankInput);
        }

        let mut inner = self.inner.lock().await;
        cancel_active(&mut inner, &self.events);

        inner.last_turn += 1;
        let turn = inner.last_turn;
        inner.log.append(ChatEntry::user(text));
        inner.log.append(ChatEntry::placeholder());
        let _ = self.events.send(SessionEvent::SendingStarted { turn });

        info!("Turn {}: translating {} -> {}", turn, source_language, target_language);

        let request = TranslationRequest::new(text, source_language, target_language);
        let client = self.client.clone();
        let shared = self.inner.clone();
        let events = self.events.clone();
        // The lock is held until `active` is set, so the task cannot resolve before that.
        let handle = tokio::spawn(async move {
            let result = client.translate(&request).await;
            let mut inner = shared.lock().await;
            resolve_turn(&mut inner, turn, result, &events);
        });
        inner.active = Some(ActiveRequest {
            turn,
            abort: handle.abort_handle(),
        });

        Ok(turn)
    }

    /// Cancel the in-flight turn, if any. Calling this when idle does nothing.
    pub async fn cancel(&self) {
        let mut inner = self.inner.lock().await;
        cancel_active(&mut inner, &self.events);
    }

    pub async fn snapshot(&self) -> Vec<ChatEntry> {
        self.inner.lock().await.log.snapshot()
    }

    /// Receive the full log after every mutation
    pub async fn subscribe(&self) -> broadcast::Receiver<Vec<ChatEntry>> {
        self.inner.lock().await.log.subscribe()
    }

    pub async fn is_in_flight(&self) -> bool {
        self.inner.lock().await.active.is_some()
    }
}

fn cancel_active(inner: &mut SessionInner, events: &mpsc::UnboundedSender<SessionEvent>) {
    let Some(active) = inner.active.take() else {
        return;
    };

    // Fire-and-forget: the task may still be unwinding, but its turn is no longer active.
    active.abort.abort();
    debug!("Turn {} cancelled", active.turn);

    if let Err(e) = inner
        .log
        .replace_last_placeholder(ChatEntry::translator(CANCELLED_NOTICE, EntryStatus::Cancelled))
    {
        error!("Turn {}: {}", active.turn, e);
    }
    let _ = events.send(SessionEvent::SendingEnded {
        turn: active.turn,
        outcome: TurnOutcome::Cancelled,
    });
}

fn resolve_turn(
    inner: &mut SessionInner,
    turn: u64,
    result: Result<TranslationData, TranslateError>,
    events: &mpsc::UnboundedSender<SessionEvent>,
) {
    match &inner.active {
        Some(active) if active.turn == turn => {}
        _ => {
            debug!("Ignoring stale completion for turn {}", turn);
            return;
        }
    }
    inner.active = None;

    let (entry, outcome, translated) = match result {
        Ok(data) => {
            debug!("Turn {} translated", turn);
            (
                ChatEntry::translator(data.translated_text.clone(), EntryStatus::Success),
                TurnOutcome::Success,
                Some(data.translated_text),
            )
        }
        Err(e) => {
            warn!("Turn {} failed: {}", turn, e);
            (
                ChatEntry::translator(format!("Translation failed: {}", e), EntryStatus::Failed),
                TurnOutcome::Failed,
                None,
            )
        }
    };

    if let Err(e) = inner.log.replace_last_placeholder(entry) {
        error!("Turn {}: {}", turn, e);
    }
    let _ = events.send(SessionEvent::SendingEnded { turn, outcome });
    if let Some(translated_text) = translated {
        let _ = events.send(SessionEvent::Completed {
            turn,
            translated_text,
        });
    }
}
