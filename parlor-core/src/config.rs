use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ParlorConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub supabase: SupabaseConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
    /// Final path segment of the agent endpoint: `POST /api/<agent_name>`.
    pub agent_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            agent_name: "agent".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub bearer_token: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Supabase,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Upper bound on waiting for a pooled connection before failing.
    pub acquire_timeout_seconds: u64,
    pub create_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            acquire_timeout_seconds: 5,
            create_schema: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: String,
    pub table: String,
    pub timeout_seconds: u64,
    /// Insertion-order column used to break `created_at` ties. Empty orders by
    /// `created_at` alone.
    pub tiebreak_column: String,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_key: String::new(),
            table: "messages".to_string(),
            timeout_seconds: 30,
            tiebreak_column: "seq".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HistoryConfig {
    /// Keep only the most recent N turns. `0` keeps the whole session.
    pub max_turns: usize,
}

/// Environment variables that override file values, as `(variable, config key)`.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("API_BEARER_TOKEN", "auth.bearer_token"),
    ("DATABASE_URL", "database.url"),
    ("SUPABASE_URL", "supabase.url"),
    ("SUPABASE_SERVICE_KEY", "supabase.service_key"),
    ("SUPABASE_TIEBREAK_COLUMN", "supabase.tiebreak_column"),
    ("PARLOR_STORAGE_BACKEND", "storage.backend"),
    ("PARLOR_AGENT_NAME", "service.agent_name"),
    ("PARLOR_HTTP_HOST", "http.host"),
    ("PARLOR_HTTP_PORT", "http.port"),
];

impl ParlorConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Like [`ParlorConfig::load`] but reads overrides through `lookup`.
    pub fn load_with<F>(path: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Config::builder().add_source(File::with_name(path).required(false));
        for (var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(*key, lookup(*var))?;
        }
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations missing values the selected backend needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.bearer_token.is_empty() {
            return Err(ConfigError::Message(
                "API_BEARER_TOKEN must not be empty".to_string(),
            ));
        }
        if self.service.agent_name.is_empty() || self.service.agent_name.contains('/') {
            return Err(ConfigError::Message(format!(
                "invalid agent name {:?}",
                self.service.agent_name
            )));
        }
        match self.storage.backend {
            StorageBackend::Postgres if self.database.url.is_empty() => Err(
                ConfigError::Message("DATABASE_URL is required for the postgres backend".to_string()),
            ),
            StorageBackend::Supabase
                if self.supabase.url.is_empty() || self.supabase.service_key.is_empty() =>
            {
                Err(ConfigError::Message(
                    "SUPABASE_URL and SUPABASE_SERVICE_KEY are required for the supabase backend"
                        .to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}
