//! Conversation history for the reasoning step.
//!
//! Reads a session straight from the [`MessageStore`] on every call. There is
//! no cache at this layer; callers wanting one must add it above.

use serde::{Deserialize, Serialize};

use crate::models::{Message, MessageType};
use crate::storage::{MessageStore, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl From<MessageType> for Role {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Human => Role::User,
            MessageType::Assistant => Role::Assistant,
        }
    }
}

/// One prior turn as the reasoning collaborator sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

impl From<Message> for HistoryTurn {
    fn from(message: Message) -> Self {
        Self {
            role: message.kind.into(),
            content: message.content,
        }
    }
}

/// Load the turns of `session_id`, oldest first.
///
/// `max_turns` keeps only the most recent turns; `0` keeps them all.
pub async fn load_history(
    store: &dyn MessageStore,
    session_id: &str,
    max_turns: usize,
) -> Result<Vec<HistoryTurn>, StorageError> {
    let messages = store.fetch_history(session_id).await?;
    let skip = match max_turns {
        0 => 0,
        n => messages.len().saturating_sub(n),
    };

    Ok(messages.into_iter().skip(skip).map(HistoryTurn::from).collect())
}
