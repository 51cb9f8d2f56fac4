use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{decode_body, MessageStore, StorageError};
use crate::models::{Message, MessageBody, MessageType};

/// History ordering when the table carries the `seq` insertion counter.
const ORDER_WITH_SEQ: &str = "ORDER BY created_at ASC, seq ASC";
/// Fallback for tables without `seq`: ties keep whatever order Postgres returns.
const ORDER_BY_TIME: &str = "ORDER BY created_at ASC";

/// Pooled-connection store. Each operation borrows one connection from the
/// pool; the guard returns it on every exit path, including errors.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    order_by: &'static str,
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    session_id: String,
    created_at: DateTime<Utc>,
    message: serde_json::Value,
}

impl MessageRow {
    fn into_message(self) -> Result<Message, StorageError> {
        let body = decode_body(self.message)?;
        Ok(Message::from_body(self.id, self.session_id, self.created_at, body))
    }
}

impl PostgresStore {
    /// Wrap `pool`, ordering ties by `seq` only if the table has that column.
    pub async fn from_pool(pool: PgPool) -> Result<Self, sqlx::Error> {
        let has_seq = crate::db::has_column(&pool, "messages", "seq").await?;
        if !has_seq {
            tracing::warn!(
                "messages table has no `seq` column; equal timestamps fall back to storage order \
                 (set database.create_schema = true to add it)"
            );
        }
        Ok(Self::with_seq_tiebreak(pool, has_seq))
    }

    pub fn with_seq_tiebreak(pool: PgPool, has_seq: bool) -> Self {
        Self {
            pool,
            order_by: if has_seq { ORDER_WITH_SEQ } else { ORDER_BY_TIME },
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MessageStore for PostgresStore {
    async fn fetch_history(&self, session_id: &str) -> Result<Vec<Message>, StorageError> {
        let mut conn = self.pool.acquire().await?;

        let sql = format!(
            "SELECT id, session_id, created_at, message FROM messages WHERE session_id = $1 {}",
            self.order_by
        );
        let rows: Vec<MessageRow> = sqlx::query_as(&sql)
            .bind(session_id)
            .fetch_all(&mut *conn)
            .await?;

        rows.into_iter().map(MessageRow::into_message).collect()
    }

    async fn store_message(
        &self,
        session_id: &str,
        kind: MessageType,
        content: &str,
        data: Option<serde_json::Value>,
    ) -> Result<Message, StorageError> {
        let body = MessageBody {
            kind,
            content: content.to_string(),
            data,
        };

        let mut conn = self.pool.acquire().await?;

        // Single statement: the row is either fully written or not at all.
        let row: MessageRow = sqlx::query_as(
            r#"
            INSERT INTO messages (session_id, message)
            VALUES ($1, $2)
            RETURNING id, session_id, created_at, message
            "#,
        )
        .bind(session_id)
        .bind(Json(&body))
        .fetch_one(&mut *conn)
        .await?;

        tracing::debug!(session_id, id = %row.id, kind = %kind, "Stored message");
        row.into_message()
    }

    async fn health(&self) -> Result<String, StorageError> {
        Ok(crate::db::health_check(&self.pool).await?)
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Postgres pool closed");
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
