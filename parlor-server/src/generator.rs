//! Response generation seam.
//!
//! The pipeline hands the query and prior turns to a [`ResponseGenerator`] and
//! stores whatever text it returns. Real agents plug in here; the service ships
//! with [`PlaceholderGenerator`] only.

use async_trait::async_trait;
use parlor_core::HistoryTurn;
use thiserror::Error;

/// Output of one generation step.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub content: String,
    /// Auxiliary structured output (tool calls and the like), stored on the
    /// assistant turn.
    pub data: Option<serde_json::Value>,
}

impl Generated {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            data: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("generation failed: {0}")]
    Failed(String),
}

/// Produces the assistant's reply for a query given the session so far.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(
        &self,
        query: &str,
        history: &[HistoryTurn],
    ) -> Result<Generated, GenerationError>;

    /// Generator name for logging.
    fn name(&self) -> &str;
}

/// Stand-in until a real agent is wired in: acknowledges the query.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderGenerator;

#[async_trait]
impl ResponseGenerator for PlaceholderGenerator {
    async fn generate(
        &self,
        query: &str,
        history: &[HistoryTurn],
    ) -> Result<Generated, GenerationError> {
        tracing::debug!(prior_turns = history.len(), "Placeholder generator invoked");
        Ok(Generated::text(format!(
            "This is a sample agent response to: {}",
            query
        )))
    }

    fn name(&self) -> &str {
        "placeholder"
    }
}
