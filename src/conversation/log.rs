use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

const SUBSCRIBER_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Translator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Success,
    Failed,
    Cancelled,
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub content: String,
    pub author: Author,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
    /// Set only on the transient "awaiting translation" entry
    pub is_placeholder: bool,
}

impl ChatEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(content, Author::User, EntryStatus::Success, false)
    }

    pub fn placeholder() -> Self {
        Self::new(String::new(), Author::Translator, EntryStatus::Success, true)
    }

    pub fn translator(content: impl Into<String>, status: EntryStatus) -> Self {
        Self::new(content, Author::Translator, status, false)
    }

    fn new(
        content: impl Into<String>,
        author: Author,
        status: EntryStatus,
        is_placeholder: bool,
    ) -> Self {
        Self {
            content: content.into(),
            author,
            status,
            created_at: Utc::now(),
            is_placeholder,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("invariant violation: {0}")]
    InvariantViolation(&'static str),
}

/// Ordered chat history, oldest first.
///
/// Every mutation publishes the full updated sequence to subscribers before
/// returning, so observers see mutations in the order they were applied.
pub struct ConversationLog {
    entries: Vec<ChatEntry>,
    updates: broadcast::Sender<Vec<ChatEntry>>,
}

impl ConversationLog {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        Self {
            entries: Vec::new(),
            updates,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<ChatEntry>> {
        self.updates.subscribe()
    }

    pub fn append(&mut self, entry: ChatEntry) {
        let entry = self.stamp(entry);
        self.entries.push(entry);
        self.publish();
    }

    /// Swap the trailing placeholder for `entry` as a single observable mutation.
    pub fn replace_last_placeholder(&mut self, entry: ChatEntry) -> Result<(), LogError> {
        match self.entries.last() {
            Some(last) if last.is_placeholder => {}
            _ => {
                return Err(LogError::InvariantViolation(
                    "last entry is not a placeholder",
                ))
            }
        }
        self.entries.pop();
        let entry = self.stamp(entry);
        self.entries.push(entry);
        self.publish();
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<ChatEntry> {
        self.entries.clone()
    }

    // Wall clocks can step backwards; keep created_at non-decreasing.
    fn stamp(&self, mut entry: ChatEntry) -> ChatEntry {
        if let Some(last) = self.entries.last() {
            if entry.created_at < last.created_at {
                entry.created_at = last.created_at;
            }
        }
        entry
    }

    fn publish(&self) {
        // No receivers is fine; the log is still the source of truth.
        let _ = self.updates.send(self.entries.clone());
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}
