use thiserror::Error;

use crate::storage::StorageError;

/// Startup and wiring errors. Request-time failures use the narrower
/// [`StorageError`] and the server's pipeline error instead.
#[derive(Error, Debug)]
pub enum ParlorError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
