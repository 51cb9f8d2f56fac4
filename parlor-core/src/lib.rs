pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod history;
pub mod models;
pub mod storage;

pub use api::{AgentRequest, AgentResponse, RequestError};
pub use config::ParlorConfig;
pub use error::ParlorError;
pub use history::{load_history, HistoryTurn, Role};
pub use models::{Message, MessageType};
pub use storage::{create_store, MemoryStore, MessageStore, PostgresStore, StorageError, SupabaseStore};
