//! Configuration module for Game Hangar.
//!
//! Settings come from an optional TOML file and are then overridden by
//! environment variables. Deployments usually rely on the environment alone.

use serde::Deserialize;
use std::path::Path;

use crate::{HangarError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request handler timeout in seconds.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_secs: u64,
    /// Request body read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// CORS allowed origins. Empty means any origin without credentials.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Login and registration attempts allowed per client per minute.
    #[serde(default = "default_login_rate_limit")]
    pub login_rate_limit: u32,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_handler_timeout() -> u64 {
    5
}

fn default_read_timeout() -> u64 {
    5
}

fn default_login_rate_limit() -> u32 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            handler_timeout_secs: default_handler_timeout(),
            read_timeout_secs: default_read_timeout(),
            cors_origins: vec![],
            login_rate_limit: default_login_rate_limit(),
        }
    }
}

/// PostgreSQL configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string (`PSQL_CONNSTRING`).
    #[serde(default)]
    pub conn_string: String,
    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Startup ping budget in milliseconds.
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_ms: u64,
    /// Schema migration settings.
    #[serde(default)]
    pub migrate: MigrateConfig,
}

fn default_max_connections() -> u32 {
    10
}

fn default_ping_timeout() -> u64 {
    100
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            conn_string: String::new(),
            max_connections: default_max_connections(),
            ping_timeout_ms: default_ping_timeout(),
            migrate: MigrateConfig::default(),
        }
    }
}

/// Schema migration configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MigrateConfig {
    /// Run migrations at startup.
    #[serde(default)]
    pub enabled: bool,
    /// Directory of `NNNN_name.sql` files. Embedded migrations when unset.
    #[serde(default)]
    pub root_dir: Option<String>,
    /// Table recording the applied schema version.
    #[serde(default = "default_version_table")]
    pub version_table: String,
    /// Version the schema must be at after startup.
    #[serde(default)]
    pub expected_version: i64,
}

fn default_version_table() -> String {
    "schema_version".to_string()
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            root_dir: None,
            version_table: default_version_table(),
            expected_version: 0,
        }
    }
}

/// S3-compatible object store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Bucket holding every blob.
    #[serde(default)]
    pub bucket: String,
    /// Custom endpoint (MinIO and friends). Enables path-style addressing.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Bucket region.
    #[serde(default)]
    pub region: String,
    /// Lifetime of presigned GET URLs in seconds.
    #[serde(default = "default_presign_expiry")]
    pub presign_expiry_secs: u64,
}

fn default_presign_expiry() -> u64 {
    3600
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            endpoint: None,
            region: String::new(),
            presign_expiry_secs: default_presign_expiry(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file; output is mirrored to stdout.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Object store configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(HangarError::Io)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| HangarError::Config(format!("config parse error: {e}")))
    }

    /// Build the process configuration.
    ///
    /// Reads the TOML file named by `HANGAR_CONFIG` when set, overlays the
    /// process environment and validates the result.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("HANGAR_CONFIG") {
            Ok(path) if !path.is_empty() => Self::load(path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// Empty values are treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("PORT") {
            self.server.port = parse_var("PORT", &port)?;
        }
        if let Some(conn) = get("PSQL_CONNSTRING") {
            self.database.conn_string = conn;
        }
        if let Some(flag) = get("PSQL_MIGRATE_DATABASE") {
            self.database.migrate.enabled = parse_bool("PSQL_MIGRATE_DATABASE", &flag)?;
        }
        if let Some(dir) = get("PSQL_MIGRATE_ROOT_DIR") {
            self.database.migrate.root_dir = Some(dir);
        }
        if let Some(table) = get("PSQL_MIGRATE_VERSION_TABLE") {
            self.database.migrate.version_table = table;
        }
        if let Some(version) = get("PSQL_MIGRATE_EXPECTED_VERSION") {
            self.database.migrate.expected_version =
                parse_var("PSQL_MIGRATE_EXPECTED_VERSION", &version)?;
        } else if self.database.migrate.enabled && self.database.migrate.expected_version == 0 {
            return Err(HangarError::Config(
                "PSQL_MIGRATE_EXPECTED_VERSION is required when PSQL_MIGRATE_DATABASE is set"
                    .to_string(),
            ));
        }
        if let Some(bucket) = get("AWS_BUCKET_NAME") {
            self.storage.bucket = bucket;
        }
        if let Some(endpoint) = get("AWS_BUCKET_ENDPOINT") {
            self.storage.endpoint = Some(endpoint);
        }
        if let Some(region) = get("AWS_BUCKET_REGION") {
            self.storage.region = region;
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(file) = get("LOG_FILE") {
            self.logging.file = Some(file);
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database.conn_string.is_empty() {
            return Err(missing("PSQL_CONNSTRING"));
        }
        if self.storage.bucket.is_empty() {
            return Err(missing("AWS_BUCKET_NAME"));
        }
        if self.storage.region.is_empty() {
            return Err(missing("AWS_BUCKET_REGION"));
        }
        if self.server.port == 0 {
            return Err(HangarError::Config("PORT must not be 0".to_string()));
        }
        if !is_sql_identifier(&self.database.migrate.version_table) {
            return Err(HangarError::Config(format!(
                "invalid version table name: {}",
                self.database.migrate.version_table
            )));
        }
        Ok(())
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn missing(key: &str) -> HangarError {
    HangarError::Config(format!("{key} is not set"))
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| HangarError::Config(format!("{key} has an invalid value: {value}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" => Ok(true),
        "0" | "f" | "false" | "no" => Ok(false),
        _ => Err(HangarError::Config(format!(
            "{key} has an invalid value: {value}"
        ))),
    }
}

/// Accepts `name` or `schema.name` made of ASCII letters, digits and underscores.
pub(crate) fn is_sql_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            !part.is_empty()
                && !part.starts_with(|c: char| c.is_ascii_digit())
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
