//! Request pipeline: validate → load history → store human turn → generate →
//! store assistant turn.
//!
//! Authentication happens earlier, in [`crate::auth`]. Every failure past that
//! point is folded into a [`PipelineError`] whose status the HTTP layer returns
//! as-is; internal detail goes to the log, never to the client.

use std::sync::Arc;

use axum::http::StatusCode;
use parlor_core::{
    load_history, AgentRequest, AgentResponse, MessageStore, MessageType, RequestError,
    StorageError,
};
use thiserror::Error;

use crate::generator::{GenerationError, ResponseGenerator};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    Validation(#[from] RequestError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// The pipeline task panicked or was aborted.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Storage(_)
            | PipelineError::Generation(_)
            | PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients.
    pub fn public_message(&self) -> String {
        match self {
            PipelineError::Validation(e) => e.to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

/// Everything one request needs. Cheap to clone; holds no per-request state.
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn MessageStore>,
    generator: Arc<dyn ResponseGenerator>,
    max_turns: usize,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn MessageStore>,
        generator: Arc<dyn ResponseGenerator>,
        max_turns: usize,
    ) -> Self {
        Self {
            store,
            generator,
            max_turns,
        }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Run the pipeline on its own task.
    ///
    /// Dropping the returned future (client disconnect) does not cancel the
    /// task, so a write already issued runs to completion. A panic inside the
    /// pipeline surfaces as [`PipelineError::Internal`].
    pub async fn run_detached(&self, request: AgentRequest) -> Result<AgentResponse, PipelineError> {
        let pipeline = self.clone();
        match tokio::spawn(async move { pipeline.run(request).await }).await {
            Ok(result) => result,
            Err(e) => Err(PipelineError::Internal(e.to_string())),
        }
    }

    pub async fn run(&self, request: AgentRequest) -> Result<AgentResponse, PipelineError> {
        request.validate()?;

        let session_id = request.session_id.as_str();

        // History is read before the new turn is stored, so it holds prior turns only.
        let history = load_history(self.store.as_ref(), session_id, self.max_turns).await?;
        tracing::debug!(session_id, turns = history.len(), "Loaded conversation history");

        self.store
            .store_message(session_id, MessageType::Human, &request.query, None)
            .await?;

        let generated = self.generator.generate(&request.query, &history).await?;

        let data = with_request_id(generated.data, &request.request_id);
        self.store
            .store_message(session_id, MessageType::Assistant, &generated.content, Some(data))
            .await?;

        tracing::info!(
            session_id,
            user_id = %request.user_id,
            request_id = %request.request_id,
            generator = self.generator.name(),
            "Agent request completed"
        );
        Ok(AgentResponse::ok())
    }
}

/// Attach `request_id` to the generator's structured output.
fn with_request_id(data: Option<serde_json::Value>, request_id: &str) -> serde_json::Value {
    let mut map = match data {
        Some(serde_json::Value::Object(map)) => map,
        Some(other) => {
            let mut map = serde_json::Map::new();
            map.insert("payload".to_string(), other);
            map
        }
        None => serde_json::Map::new(),
    };
    map.insert(
        "request_id".to_string(),
        serde_json::Value::String(request_id.to_string()),
    );
    serde_json::Value::Object(map)
}
