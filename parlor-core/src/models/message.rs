use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Origin of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Human,
    Assistant,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Human => "human",
            MessageType::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The JSON document stored in the `message` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A persisted conversation turn. Never mutated after it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Message {
    pub fn from_body(
        id: Uuid,
        session_id: String,
        created_at: DateTime<Utc>,
        body: MessageBody,
    ) -> Self {
        Self {
            id,
            session_id,
            created_at,
            kind: body.kind,
            content: body.content,
            data: body.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_type_wire_names_match_display() {
        for kind in [MessageType::Human, MessageType::Assistant] {
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.to_string()));
        }
        assert!(serde_json::from_value::<MessageType>(json!("Human")).is_err());
    }

    #[test]
    fn test_body_keeps_data_nested() {
        let body = MessageBody {
            kind: MessageType::Assistant,
            content: "hi".to_string(),
            data: Some(json!({"tool_calls": [{"name": "search"}]})),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["type"], "assistant");
        assert!(value["data"].is_object(), "data must stay a nested object");
        assert_eq!(value["data"]["tool_calls"][0]["name"], "search");
    }

    #[test]
    fn test_body_omits_absent_data() {
        let body = MessageBody {
            kind: MessageType::Human,
            content: "hello".to_string(),
            data: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, json!({"type": "human", "content": "hello"}));
    }

    #[test]
    fn test_body_rejects_unknown_type() {
        let result: Result<MessageBody, _> =
            serde_json::from_value(json!({"type": "system", "content": "x"}));
        assert!(result.is_err());
    }
}
