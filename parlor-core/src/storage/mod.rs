//! Message storage for Parlor
//!
//! Provides a `MessageStore` trait with implementations for:
//! - **Postgres** — direct connections borrowed from a bounded `sqlx` pool
//! - **Supabase** — a shared HTTP client talking to a PostgREST data API
//! - **Memory** — an in-process store for local development and tests
//!
//! Every backend returns the same shapes and the same ordering: messages of a
//! session oldest first, `created_at` ascending with insertion order breaking ties.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{ParlorConfig, StorageBackend};
use crate::error::ParlorError;
use crate::models::{Message, MessageBody, MessageType};

pub mod memory;
pub mod postgres;
pub mod supabase;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use supabase::SupabaseStore;

// ============================================================================
// MessageStore trait
// ============================================================================

/// Persistence of conversation messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// All messages of `session_id`, oldest first. An unseen session yields an
    /// empty vector, not an error.
    async fn fetch_history(&self, session_id: &str) -> Result<Vec<Message>, StorageError>;

    /// Persist exactly one new message. The store assigns `id` and `created_at`.
    async fn store_message(
        &self,
        session_id: &str,
        kind: MessageType,
        content: &str,
        data: Option<serde_json::Value>,
    ) -> Result<Message, StorageError>;

    /// Check that the backing medium is reachable and usable. Returns a short description on success.
    async fn health(&self) -> Result<String, StorageError>;

    /// Release owned resources. Operations issued afterwards fail with
    /// [`StorageError::Unavailable`] where the backend owns a lifecycle.
    async fn close(&self) {}

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum StorageError {
    /// The medium cannot be reached: pool closed or exhausted, connect
    /// failure, transport error.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The medium refused the operation (constraint violation, non-2xx reply).
    #[error("storage rejected operation ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("database error: {0}")]
    Database(String),

    /// A stored row could not be turned back into a `Message`.
    #[error("malformed stored message: {0}")]
    Decode(String),
}

impl StorageError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
                StorageError::Unavailable(e.to_string())
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => StorageError::Unavailable(e.to_string()),
            sqlx::Error::Database(db) => StorageError::Rejected {
                code: db.code().map(|c| c.into_owned()).unwrap_or_default(),
                message: db.message().to_string(),
            },
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StorageError::Decode(e.to_string())
            }
            other => StorageError::Database(other.to_string()),
        }
    }
}

/// Parse the JSON `message` column into its typed form.
pub(crate) fn decode_body(value: serde_json::Value) -> Result<MessageBody, StorageError> {
    serde_json::from_value(value).map_err(|e| StorageError::Decode(e.to_string()))
}

// ============================================================================
// Factory
// ============================================================================

/// Build the store selected by `[storage] backend`.
///
/// Called once during startup; the returned handle is shared by every request
/// and closed explicitly at shutdown.
pub async fn create_store(config: &ParlorConfig) -> Result<Arc<dyn MessageStore>, ParlorError> {
    let store: Arc<dyn MessageStore> = match config.storage.backend {
        StorageBackend::Postgres => {
            let pool = crate::db::create_pool(&config.database).await?;
            if config.database.create_schema {
                crate::db::ensure_schema(&pool).await?;
            }
            Arc::new(PostgresStore::from_pool(pool).await?)
        }
        StorageBackend::Supabase => {
            let store = SupabaseStore::new(&config.supabase)?;
            // Fails on a missing tie-break column instead of on the first read.
            store.health().await?;
            Arc::new(store)
        }
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };

    tracing::info!(backend = store.name(), "Message store ready");
    Ok(store)
}
