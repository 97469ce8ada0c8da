use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gemini: GeminiConfig,
    pub vector: VectorConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub event_log: EventLogConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite database path (e.g., "sqlite:./data/neoreg.db")
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeminiConfig {
    pub enabled: bool,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorConfig {
    pub enabled: bool,
    pub base_url: String,
    pub collection: String,
    #[serde(default = "default_vector_size")]
    pub vector_size: u64,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Base directory for uploaded photos
    pub photo_dir: String,
    #[serde(default = "default_max_photo_bytes")]
    pub max_photo_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventLogConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}

fn default_vector_size() -> u64 {
    768
}

fn default_max_photo_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_capacity() -> usize {
    1000
}

pub fn load_config() -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::with_name("config").required(false))
        .add_source(config::Environment::with_prefix("NEOREG").separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.database.url.is_empty() {
        anyhow::bail!("Database URL cannot be empty");
    }

    if cfg.gemini.enabled && cfg.gemini.api_key.is_empty() {
        anyhow::bail!("Gemini is enabled but no API key is configured");
    }

    if cfg.vector.enabled && !cfg.gemini.enabled {
        anyhow::bail!("Vector search requires Gemini embeddings; enable gemini as well");
    }

    if cfg.event_log.capacity == 0 {
        anyhow::bail!("Event log capacity must be greater than 0");
    }

    Ok(())
}

/// Fixed config for unit tests; no file or environment access.
#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            log_level: "info".to_string(),
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
        },
        gemini: GeminiConfig {
            enabled: true,
            api_key: "test-key".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            timeout_seconds: 30,
        },
        vector: VectorConfig {
            enabled: false,
            base_url: "http://localhost:6333".to_string(),
            collection: "employees".to_string(),
            vector_size: 768,
            timeout_seconds: 30,
        },
        storage: StorageConfig {
            photo_dir: "uploads/photos".to_string(),
            max_photo_bytes: 2 * 1024 * 1024,
        },
        event_log: EventLogConfig { capacity: 1000 },
    }
}
