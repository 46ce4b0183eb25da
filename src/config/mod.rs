//! Configuration management
//!
//! Configuration is loaded from a `config.yml` file, then environment
//! variables prefixed with `NEWSROOM_` override individual values.
//! Every field has a default, so an absent or empty file is valid.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Dashboard origin allowed to call the API with credentials
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Reverse proxies whose `X-Forwarded-For` / `X-Real-IP` headers are
    /// believed; other peers are keyed by their socket address
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            trusted_proxies: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Connection URL, or a file path for SQLite
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/newsroom.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub driver: CacheDriver,
    /// Default entry lifetime in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            driver: CacheDriver::default(),
            ttl_seconds: default_ttl(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

/// Cache driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheDriver {
    /// In-process cache (default)
    #[default]
    Memory,
    /// Caching disabled
    None,
}

/// Longest session lifetime `validate` accepts
pub const MAX_SESSION_TTL_DAYS: i64 = 3650;

/// Authentication and session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime in days
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: i64,
    /// Sessions not refreshed for this many hours get their expiry extended on use
    #[serde(default = "default_session_refresh_hours")]
    pub session_refresh_hours: i64,
    /// Name of the session cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Add the `Secure` attribute to the session cookie
    #[serde(default)]
    pub cookie_secure: bool,
    /// Allow public sign-up once an admin exists
    #[serde(default)]
    pub allow_sign_up: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_days: default_session_ttl_days(),
            session_refresh_hours: default_session_refresh_hours(),
            cookie_name: default_cookie_name(),
            cookie_secure: false,
            allow_sign_up: false,
        }
    }
}

fn default_session_ttl_days() -> i64 {
    7
}

fn default_session_refresh_hours() -> i64 {
    24
}

fn default_cookie_name() -> String {
    "newsroom_session".to_string()
}

/// Image storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub driver: StorageDriver,
    /// Maximum upload size in bytes (default: 5MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
    #[serde(default)]
    pub local: LocalStorageConfig,
    #[serde(default)]
    pub remote: RemoteStorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver: StorageDriver::default(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
            local: LocalStorageConfig::default(),
            remote: RemoteStorageConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t.eq_ignore_ascii_case(mime_type))
    }
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
    ]
}

/// Image storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    /// Files written to a local directory and served by this process
    #[default]
    Local,
    /// Files sent to a remote image host
    Remote,
}

/// Local directory storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// URL prefix under which stored files are served
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            public_base_url: default_public_base_url(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_public_base_url() -> String {
    "/uploads".to_string()
}

/// Remote image host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteStorageConfig {
    /// Upload endpoint accepting a multipart `file` field
    #[serde(default)]
    pub endpoint: String,
    /// Bearer token sent with each upload
    #[serde(default)]
    pub api_key: Option<String>,
    /// Folder passed to the host alongside the file
    #[serde(default)]
    pub folder: Option<String>,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, then apply `NEWSROOM_*` overrides
    ///
    /// Recognized variables:
    /// - NEWSROOM_SERVER_HOST, NEWSROOM_SERVER_PORT, NEWSROOM_SERVER_CORS_ORIGIN
    /// - NEWSROOM_SERVER_TRUSTED_PROXIES (comma separated)
    /// - NEWSROOM_DATABASE_DRIVER, NEWSROOM_DATABASE_URL
    /// - NEWSROOM_CACHE_DRIVER, NEWSROOM_CACHE_TTL_SECONDS
    /// - NEWSROOM_AUTH_COOKIE_SECURE, NEWSROOM_AUTH_ALLOW_SIGN_UP
    /// - NEWSROOM_STORAGE_DRIVER, NEWSROOM_STORAGE_REMOTE_ENDPOINT, NEWSROOM_STORAGE_REMOTE_API_KEY
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that cannot work at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_SESSION_TTL_DAYS).contains(&self.auth.session_ttl_days) {
            return Err(ConfigError::ValidationError(format!(
                "auth.session_ttl_days must be between 1 and {}",
                MAX_SESSION_TTL_DAYS
            )));
        }
        if !(0..=MAX_SESSION_TTL_DAYS * 24).contains(&self.auth.session_refresh_hours) {
            return Err(ConfigError::ValidationError(format!(
                "auth.session_refresh_hours must be between 0 and {}",
                MAX_SESSION_TTL_DAYS * 24
            )));
        }
        if self.storage.driver == StorageDriver::Remote && self.storage.remote.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.remote.endpoint is required when storage.driver is 'remote'".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(host) = env_value("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_value("SERVER_PORT") {
            self.server.port = port;
        }
        if let Some(cors_origin) = env_value("SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Some(proxies) = env_value::<String>("SERVER_TRUSTED_PROXIES") {
            self.server.trusted_proxies = proxies
                .split(',')
                .filter_map(|ip| ip.trim().parse().ok())
                .collect();
        }

        match env_value::<String>("DATABASE_DRIVER").map(|d| d.to_lowercase()).as_deref() {
            Some("sqlite") => self.database.driver = DatabaseDriver::Sqlite,
            Some("mysql") => self.database.driver = DatabaseDriver::Mysql,
            _ => {}
        }
        if let Some(url) = env_value("DATABASE_URL") {
            self.database.url = url;
        }

        match env_value::<String>("CACHE_DRIVER").map(|d| d.to_lowercase()).as_deref() {
            Some("memory") => self.cache.driver = CacheDriver::Memory,
            Some("none") => self.cache.driver = CacheDriver::None,
            _ => {}
        }
        if let Some(ttl) = env_value("CACHE_TTL_SECONDS") {
            self.cache.ttl_seconds = ttl;
        }

        if let Some(secure) = env_value("AUTH_COOKIE_SECURE") {
            self.auth.cookie_secure = secure;
        }
        if let Some(allow) = env_value("AUTH_ALLOW_SIGN_UP") {
            self.auth.allow_sign_up = allow;
        }

        match env_value::<String>("STORAGE_DRIVER").map(|d| d.to_lowercase()).as_deref() {
            Some("local") => self.storage.driver = StorageDriver::Local,
            Some("remote") => self.storage.driver = StorageDriver::Remote,
            _ => {}
        }
        if let Some(endpoint) = env_value("STORAGE_REMOTE_ENDPOINT") {
            self.storage.remote.endpoint = endpoint;
        }
        if let Some(api_key) = env_value("STORAGE_REMOTE_API_KEY") {
            self.storage.remote.api_key = Some(api_key);
        }
    }
}

/// Read `NEWSROOM_{key}`; unset or unparsable values are ignored
fn env_value<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(format!("NEWSROOM_{}", key))
        .ok()
        .and_then(|value| value.parse().ok())
}

/// Format YAML parsing error with location
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    match e.location() {
        Some(location) => format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        ),
        None => e.to_string(),
    }
}

// Tests that touch environment variables share this lock.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
