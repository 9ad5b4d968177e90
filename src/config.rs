//! Configuration module for MyCloud.

use serde::Deserialize;
use std::path::Path;

use crate::{CloudError, Result};

/// Web API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Host address to bind.
    #[serde(default = "default_web_host")]
    pub host: String,
    /// Port number for the Web API.
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// JWT secret key (required).
    #[serde(default)]
    pub jwt_secret: String,
    /// Access token expiry in seconds.
    #[serde(default = "default_jwt_access_expiry")]
    pub jwt_access_token_expiry_secs: u64,
    /// Refresh token expiry in days.
    #[serde(default = "default_jwt_refresh_expiry")]
    pub jwt_refresh_token_expiry_days: u64,
    /// Rate limit for the login endpoint (requests per minute per IP).
    #[serde(default = "default_login_rate_limit")]
    pub login_rate_limit: u32,
    /// Rate limit for anonymous public-link downloads (requests per minute per IP).
    #[serde(default = "default_link_rate_limit")]
    pub link_rate_limit: u32,
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    8000
}

fn default_jwt_access_expiry() -> u64 {
    900 // 15 minutes
}

fn default_jwt_refresh_expiry() -> u64 {
    7
}

fn default_login_rate_limit() -> u32 {
    5
}

fn default_link_rate_limit() -> u32 {
    60
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
            cors_origins: vec![],
            jwt_secret: String::new(),
            jwt_access_token_expiry_secs: default_jwt_access_expiry(),
            jwt_refresh_token_expiry_days: default_jwt_refresh_expiry(),
            login_rate_limit: default_login_rate_limit(),
            link_rate_limit: default_link_rate_limit(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/mycloud.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// File storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    /// Root directory of all blob storage. Per-user storage roots live below it.
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
    /// Deadline in seconds for a single blob write or blob read.
    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: u64,
}

fn default_storage_path() -> String {
    "media".to_string()
}

fn default_max_upload_size() -> u64 {
    100
}

fn default_io_timeout() -> u64 {
    300
}

impl FilesConfig {
    /// Maximum upload size in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            max_upload_size_mb: default_max_upload_size(),
            io_timeout_secs: default_io_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/mycloud.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Administrator account created or promoted at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_username")]
    pub username: String,
    #[serde(default = "default_admin_email")]
    pub email: String,
    /// Password for the account. Bootstrap is skipped while empty.
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_admin_full_name")]
    pub full_name: String,
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_email() -> String {
    "admin@example.com".to_string()
}

fn default_admin_full_name() -> String {
    "Administrator".to_string()
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            email: default_admin_email(),
            password: String::new(),
            full_name: default_admin_full_name(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Web API configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// File storage configuration.
    #[serde(default)]
    pub files: FilesConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Bootstrap administrator.
    #[serde(default)]
    pub admin: AdminConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(CloudError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| CloudError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `MYCLOUD_JWT_SECRET`
    /// - `MYCLOUD_STORAGE_PATH`
    /// - `MYCLOUD_DATABASE_PATH`
    /// - `MYCLOUD_ADMIN_PASSWORD`
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self) {
        let overrides: [(&str, &mut String); 4] = [
            ("MYCLOUD_JWT_SECRET", &mut self.web.jwt_secret),
            ("MYCLOUD_STORAGE_PATH", &mut self.files.storage_path),
            ("MYCLOUD_DATABASE_PATH", &mut self.database.path),
            ("MYCLOUD_ADMIN_PASSWORD", &mut self.admin.password),
        ];
        for (var, target) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    *target = value;
                }
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if the JWT secret is not set or the upload limit is zero.
    pub fn validate(&self) -> Result<()> {
        if self.web.jwt_secret.is_empty() {
            return Err(CloudError::Config(
                "jwt_secret is not set. \
                 Set it in config.toml or via MYCLOUD_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.files.max_upload_size_mb == 0 {
            return Err(CloudError::Config(
                "files.max_upload_size_mb must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
