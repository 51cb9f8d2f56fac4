use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{MessageStore, StorageError};
use crate::models::{Message, MessageType};

/// In-process store. Messages live in one insertion-ordered vector, so a
/// session's history is already chronological.
#[derive(Debug, Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<Message>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages across all sessions.
    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Unavailable("memory store closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn fetch_history(&self, session_id: &str) -> Result<Vec<Message>, StorageError> {
        self.ensure_open()?;
        let messages = self.messages.lock().await;
        Ok(messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn store_message(
        &self,
        session_id: &str,
        kind: MessageType,
        content: &str,
        data: Option<serde_json::Value>,
    ) -> Result<Message, StorageError> {
        self.ensure_open()?;
        let mut messages = self.messages.lock().await;

        // Keep created_at non-decreasing even if the wall clock steps back.
        let now = Utc::now();
        let created_at = match messages.last() {
            Some(last) if last.created_at > now => last.created_at,
            _ => now,
        };

        let message = Message {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            created_at,
            kind,
            content: content.to_string(),
            data,
        };
        messages.push(message.clone());
        Ok(message)
    }

    async fn health(&self) -> Result<String, StorageError> {
        self.ensure_open()?;
        Ok(format!("in-memory ({} messages)", self.len().await))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn name(&self) -> &str {
        "memory"
    }
}
