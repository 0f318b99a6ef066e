use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::security::{LimitPolicy, RateLimitConfig};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub vector: VectorConfig,
    pub security: SecurityConfig,
    pub schedule: ScheduleConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub dimension: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct VectorConfig {
    pub url: String,
    pub api_key: Option<SecretString>,
    pub collection: String,
    /// Minimum cosine similarity for a confident entity/intent match.
    pub similarity_threshold: f32,
    pub top_k: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct SecurityConfig {
    pub message_quota: u32,
    pub message_window_secs: u64,
    pub session_create_quota: u32,
    pub session_create_window_secs: u64,
}

impl SecurityConfig {
    pub fn rate_limits(&self) -> RateLimitConfig {
        RateLimitConfig {
            message: LimitPolicy {
                max_requests: self.message_quota,
                window: Duration::from_secs(self.message_window_secs),
            },
            session_create: LimitPolicy {
                max_requests: self.session_create_quota,
                window: Duration::from_secs(self.session_create_window_secs),
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScheduleConfig {
    pub business_start_hour: u32,
    pub business_end_hour: u32,
    pub slot_minutes: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub embedding_base_url: Option<String>,
    pub vector_url: Option<String>,
    pub vector_collection: Option<String>,
    pub similarity_threshold: Option<f32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://ticketry.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            embedding: EmbeddingConfig {
                base_url: "http://localhost:11434/v1".to_string(),
                api_key: None,
                model: "nomic-embed-text".to_string(),
                dimension: 768,
                timeout_secs: 15,
                max_retries: 2,
            },
            vector: VectorConfig {
                url: "http://localhost:6333".to_string(),
                api_key: None,
                collection: "ticketry_events".to_string(),
                similarity_threshold: 0.78,
                top_k: 5,
                timeout_secs: 10,
                max_retries: 2,
            },
            security: SecurityConfig {
                message_quota: 30,
                message_window_secs: 60,
                session_create_quota: 10,
                session_create_window_secs: 300,
            },
            schedule: ScheduleConfig {
                business_start_hour: 8,
                business_end_hour: 18,
                slot_minutes: 60,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("ticketry.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }
        if let Some(embedding) = patch.embedding {
            if let Some(base_url) = embedding.base_url {
                self.embedding.base_url = base_url;
            }
            if let Some(api_key) = embedding.api_key {
                self.embedding.api_key = Some(api_key.into());
            }
            if let Some(model) = embedding.model {
                self.embedding.model = model;
            }
            if let Some(dimension) = embedding.dimension {
                self.embedding.dimension = dimension;
            }
            if let Some(timeout_secs) = embedding.timeout_secs {
                self.embedding.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = embedding.max_retries {
                self.embedding.max_retries = max_retries;
            }
        }
        if let Some(vector) = patch.vector {
            if let Some(url) = vector.url {
                self.vector.url = url;
            }
            if let Some(api_key) = vector.api_key {
                self.vector.api_key = Some(api_key.into());
            }
            if let Some(collection) = vector.collection {
                self.vector.collection = collection;
            }
            if let Some(similarity_threshold) = vector.similarity_threshold {
                self.vector.similarity_threshold = similarity_threshold;
            }
            if let Some(top_k) = vector.top_k {
                self.vector.top_k = top_k;
            }
            if let Some(timeout_secs) = vector.timeout_secs {
                self.vector.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = vector.max_retries {
                self.vector.max_retries = max_retries;
            }
        }
        if let Some(security) = patch.security {
            if let Some(message_quota) = security.message_quota {
                self.security.message_quota = message_quota;
            }
            if let Some(message_window_secs) = security.message_window_secs {
                self.security.message_window_secs = message_window_secs;
            }
            if let Some(session_create_quota) = security.session_create_quota {
                self.security.session_create_quota = session_create_quota;
            }
            if let Some(session_create_window_secs) = security.session_create_window_secs {
                self.security.session_create_window_secs = session_create_window_secs;
            }
        }
        if let Some(schedule) = patch.schedule {
            if let Some(business_start_hour) = schedule.business_start_hour {
                self.schedule.business_start_hour = business_start_hour;
            }
            if let Some(business_end_hour) = schedule.business_end_hour {
                self.schedule.business_end_hour = business_end_hour;
            }
            if let Some(slot_minutes) = schedule.slot_minutes {
                self.schedule.slot_minutes = slot_minutes;
            }
        }
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }
        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var("TICKETRY_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(level) = env::var("TICKETRY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("TICKETRY_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        if let Ok(base_url) = env::var("TICKETRY_EMBEDDING_BASE_URL") {
            self.embedding.base_url = base_url;
        }
        if let Ok(api_key) = env::var("TICKETRY_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(api_key.into());
        }
        if let Ok(url) = env::var("TICKETRY_VECTOR_URL") {
            self.vector.url = url;
        }
        if let Ok(api_key) = env::var("TICKETRY_VECTOR_API_KEY") {
            self.vector.api_key = Some(api_key.into());
        }
        if let Ok(collection) = env::var("TICKETRY_VECTOR_COLLECTION") {
            self.vector.collection = collection;
        }
        if let Ok(value) = env::var("TICKETRY_SIMILARITY_THRESHOLD") {
            self.vector.similarity_threshold = value.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "TICKETRY_SIMILARITY_THRESHOLD".to_string(),
                    value,
                }
            })?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(base_url) = overrides.embedding_base_url {
            self.embedding.base_url = base_url;
        }
        if let Some(url) = overrides.vector_url {
            self.vector.url = url;
        }
        if let Some(collection) = overrides.vector_collection {
            self.vector.collection = collection;
        }
        if let Some(threshold) = overrides.similarity_threshold {
            self.vector.similarity_threshold = threshold;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Validation("embedding.dimension must be positive".into()));
        }
        if self.vector.collection.trim().is_empty() {
            return Err(ConfigError::Validation("vector.collection must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.vector.similarity_threshold) {
            return Err(ConfigError::Validation(
                "vector.similarity_threshold must be between 0.0 and 1.0".into(),
            ));
        }
        if self.vector.top_k == 0 {
            return Err(ConfigError::Validation("vector.top_k must be positive".into()));
        }
        if self.schedule.business_start_hour >= self.schedule.business_end_hour
            || self.schedule.business_end_hour > 24
        {
            return Err(ConfigError::Validation(
                "schedule business hours must satisfy start < end <= 24".into(),
            ));
        }
        if self.schedule.slot_minutes == 0 {
            return Err(ConfigError::Validation("schedule.slot_minutes must be positive".into()));
        }
        if self.security.message_quota == 0 || self.security.session_create_quota == 0 {
            return Err(ConfigError::Validation("security quotas must be positive".into()));
        }
        Ok(())
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    let default = PathBuf::from("ticketry.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    embedding: Option<EmbeddingPatch>,
    vector: Option<VectorPatch>,
    security: Option<SecurityPatch>,
    schedule: Option<SchedulePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    dimension: Option<usize>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct VectorPatch {
    url: Option<String>,
    api_key: Option<String>,
    collection: Option<String>,
    similarity_threshold: Option<f32>,
    top_k: Option<usize>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SecurityPatch {
    message_quota: Option<u32>,
    message_window_secs: Option<u64>,
    session_create_quota: Option<u32>,
    session_create_window_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulePatch {
    business_start_hour: Option<u32>,
    business_end_hour: Option<u32>,
    slot_minutes: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    #[test]
    fn defaults_validate() {
        let config = AppConfig::load(LoadOptions::default()).expect("defaults are valid");
        assert_eq!(config.vector.similarity_threshold, 0.78);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn file_patch_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[vector]\ncollection = \"custom_events\"\nsimilarity_threshold = 0.6\n\n[logging]\nlevel = \"debug\"\nformat = \"json\"\n"
        )
        .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            ..LoadOptions::default()
        })
        .expect("patched config loads");

        assert_eq!(config.vector.collection, "custom_events");
        assert_eq!(config.vector.similarity_threshold, 0.6);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        // Untouched sections keep defaults.
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn missing_required_file_fails() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/ticketry.toml")),
            require_file: true,
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn programmatic_overrides_win() {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                similarity_threshold: Some(0.5),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("overridden config loads");

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.vector.similarity_threshold, 0.5);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                similarity_threshold: Some(1.5),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
