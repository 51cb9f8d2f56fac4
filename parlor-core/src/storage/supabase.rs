use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{decode_body, MessageStore, StorageError};
use crate::config::SupabaseConfig;
use crate::models::{Message, MessageBody, MessageType};

// ============================================================================
// PostgREST wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct InsertRow<'a> {
    session_id: &'a str,
    message: &'a MessageBody,
}

#[derive(Debug, Deserialize)]
struct RemoteRow {
    id: Uuid,
    session_id: String,
    created_at: DateTime<Utc>,
    message: serde_json::Value,
}

impl RemoteRow {
    fn into_message(self) -> Result<Message, StorageError> {
        let body = decode_body(self.message)?;
        Ok(Message::from_body(self.id, self.session_id, self.created_at, body))
    }
}

#[derive(Debug, Deserialize)]
struct RemoteError {
    code: Option<String>,
    message: Option<String>,
}

// ============================================================================
// SupabaseStore
// ============================================================================

/// Managed remote-client store. One `reqwest::Client` is shared by all
/// requests; the service key authenticates every call.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    service_key: String,
    table: String,
    tiebreak_column: Option<String>,
}

impl SupabaseStore {
    pub fn new(config: &SupabaseConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            table: config.table.clone(),
            tiebreak_column: Some(config.tiebreak_column.trim())
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        })
    }

    /// PostgREST `order` value for history reads.
    fn order(&self) -> String {
        match &self.tiebreak_column {
            Some(column) => format!("created_at.asc,{}.asc", column),
            None => "created_at.asc".to_string(),
        }
    }

    /// Every column the store reads, so a missing one surfaces in `health`.
    fn checked_columns(&self) -> String {
        match &self.tiebreak_column {
            Some(column) => format!("id,session_id,created_at,message,{}", column),
            None => "id,session_id,created_at,message".to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, StorageError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<RemoteError>(&error_body).ok();
        let code = detail
            .as_ref()
            .and_then(|d| d.code.clone())
            .unwrap_or_else(|| status.as_u16().to_string());
        let message = detail
            .and_then(|d| d.message)
            .unwrap_or(error_body);

        tracing::error!(status = status.as_u16(), code = %code, message = %message, "Supabase API error");

        if status.is_server_error() {
            return Err(StorageError::Unavailable(format!("{}: {}", status, message)));
        }
        Err(StorageError::Rejected { code, message })
    }
}

fn transport_error(e: reqwest::Error) -> StorageError {
    if e.is_decode() {
        StorageError::Decode(e.to_string())
    } else {
        StorageError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl MessageStore for SupabaseStore {
    async fn fetch_history(&self, session_id: &str) -> Result<Vec<Message>, StorageError> {
        let filter = format!("eq.{}", session_id);
        let order = self.order();
        let request = self.client.get(self.endpoint()).query(&[
            ("select", "id,session_id,created_at,message"),
            ("session_id", filter.as_str()),
            ("order", order.as_str()),
        ]);

        let rows: Vec<RemoteRow> = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(transport_error)?;

        rows.into_iter().map(RemoteRow::into_message).collect()
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
        let request = self
            .client
            .post(self.endpoint())
            .header("Prefer", "return=representation")
            .json(&[InsertRow {
                session_id,
                message: &body,
            }]);

        let mut rows: Vec<RemoteRow> = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(transport_error)?;

        if rows.len() != 1 {
            return Err(StorageError::Decode(format!(
                "expected one inserted row, got {}",
                rows.len()
            )));
        }
        let message = rows.remove(0).into_message()?;
        tracing::debug!(session_id, id = %message.id, kind = %kind, "Stored message");
        Ok(message)
    }

    async fn health(&self) -> Result<String, StorageError> {
        let columns = self.checked_columns();
        let request = self
            .client
            .get(self.endpoint())
            .query(&[("select", columns.as_str()), ("limit", "1")]);
        self.send(request).await?;
        Ok(format!("supabase {}", self.base_url))
    }

    fn name(&self) -> &str {
        "supabase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(mock_server: &MockServer) -> SupabaseConfig {
        SupabaseConfig {
            url: format!("{}/", mock_server.uri()),
            service_key: "service-key".to_string(),
            table: "messages".to_string(),
            timeout_seconds: 5,
            tiebreak_column: "seq".to_string(),
        }
    }

    fn create_test_store(mock_server: &MockServer) -> SupabaseStore {
        SupabaseStore::new(&test_config(mock_server)).expect("Failed to create test store")
    }

    fn row(id: &str, created_at: &str, message: serde_json::Value) -> serde_json::Value {
        json!({
            "id": id,
            "session_id": "s1",
            "created_at": created_at,
            "message": message,
        })
    }

    #[tokio::test]
    async fn test_fetch_history_filters_and_orders() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/messages"))
            .and(query_param("session_id", "eq.s1"))
            .and(query_param("order", "created_at.asc,seq.asc"))
            .and(header("apikey", "service-key"))
            .and(header("authorization", "Bearer service-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                row(
                    "6f1c1c2e-8a53-4c55-9d3c-0c2b9e1a0001",
                    "2024-05-01T10:00:00.000001+00:00",
                    json!({"type": "human", "content": "Hello, agent!"})
                ),
                row(
                    "6f1c1c2e-8a53-4c55-9d3c-0c2b9e1a0002",
                    "2024-05-01T10:00:01+00:00",
                    json!({"type": "assistant", "content": "Hi", "data": {"request_id": "r1"}})
                ),
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = create_test_store(&mock_server);
        let history = store.fetch_history("s1").await.unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, MessageType::Human);
        assert_eq!(history[0].content, "Hello, agent!");
        assert_eq!(history[1].kind, MessageType::Assistant);
        assert_eq!(history[1].data, Some(json!({"request_id": "r1"})));
        assert!(history[0].created_at <= history[1].created_at);
    }

    #[tokio::test]
    async fn test_fetch_history_unseen_session_is_empty() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&mock_server)
            .await;

        let store = create_test_store(&mock_server);
        let history = store.fetch_history("never-seen").await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_store_message_sends_nested_data() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/messages"))
            .and(header("prefer", "return=representation"))
            .and(body_json(json!([{
                "session_id": "s1",
                "message": {
                    "type": "assistant",
                    "content": "Done",
                    "data": {"tool_calls": [{"name": "lookup"}]}
                }
            }])))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([row(
                "6f1c1c2e-8a53-4c55-9d3c-0c2b9e1a0003",
                "2024-05-01T10:00:02+00:00",
                json!({"type": "assistant", "content": "Done", "data": {"tool_calls": [{"name": "lookup"}]}})
            )])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = create_test_store(&mock_server);
        let message = store
            .store_message(
                "s1",
                MessageType::Assistant,
                "Done",
                Some(json!({"tool_calls": [{"name": "lookup"}]})),
            )
            .await
            .unwrap();

        assert_eq!(message.session_id, "s1");
        assert_eq!(message.content, "Done");
        assert_eq!(message.data.unwrap()["tool_calls"][0]["name"], "lookup");
    }

    #[tokio::test]
    async fn test_store_message_rejected_write() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "23514",
                "message": "new row violates check constraint",
            })))
            .mount(&mock_server)
            .await;

        let store = create_test_store(&mock_server);
        let err = store
            .store_message("s1", MessageType::Human, "hi", None)
            .await
            .unwrap_err();

        match err {
            StorageError::Rejected { code, message } => {
                assert_eq!(code, "23514");
                assert!(message.contains("check constraint"));
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&mock_server)
            .await;

        let store = create_test_store(&mock_server);
        let err = store.fetch_history("s1").await.unwrap_err();
        assert!(err.is_unavailable(), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_unknown_stored_type_is_decode_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([row(
                "6f1c1c2e-8a53-4c55-9d3c-0c2b9e1a0004",
                "2024-05-01T10:00:00+00:00",
                json!({"type": "system", "content": "?"})
            )])))
            .mount(&mock_server)
            .await;

        let store = create_test_store(&mock_server);
        let err = store.fetch_history("s1").await.unwrap_err();
        assert!(matches!(err, StorageError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        let config = SupabaseConfig {
            url: "http://127.0.0.1:1".to_string(),
            service_key: "service-key".to_string(),
            table: "messages".to_string(),
            timeout_seconds: 2,
            tiebreak_column: "seq".to_string(),
        };
        let store = SupabaseStore::new(&config).unwrap();
        let err = store.health().await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_fetch_history_without_tiebreak_orders_by_time() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/messages"))
            .and(query_param("order", "created_at.asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = SupabaseConfig {
            tiebreak_column: String::new(),
            ..test_config(&mock_server)
        };
        let store = SupabaseStore::new(&config).unwrap();
        assert!(store.fetch_history("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health_selects_tiebreak_column() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("select", "id,session_id,created_at,message,seq"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = create_test_store(&mock_server);
        assert!(store.health().await.is_ok());
    }

    #[tokio::test]
    async fn test_health_fails_when_tiebreak_column_is_missing() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "42703",
                "message": "column messages.seq does not exist",
            })))
            .mount(&mock_server)
            .await;

        let store = create_test_store(&mock_server);
        match store.health().await.unwrap_err() {
            StorageError::Rejected { code, message } => {
                assert_eq!(code, "42703");
                assert!(message.contains("seq"));
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }
}
