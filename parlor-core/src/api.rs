//! Wire types for the agent endpoint.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inbound agent request. All four fields are mandatory strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub query: String,
    pub user_id: String,
    /// Carried through as metadata only; never used for deduplication.
    pub request_id: String,
    pub session_id: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RequestError {
    #[error("field `{0}` must not be blank")]
    Blank(&'static str),
}

impl AgentRequest {
    /// Shape checks beyond what deserialization already enforces.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.session_id.trim().is_empty() {
            return Err(RequestError::Blank("session_id"));
        }
        if self.query.trim().is_empty() {
            return Err(RequestError::Blank("query"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
        }
    }
}
