use serde::Deserialize;
use std::collections::HashMap;

/// Top-level configuration for the CRM API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub invitations: InvitationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_name")]
    pub database: String,
    #[serde(default = "default_db_user")]
    pub username: String,
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Logging configuration, consumed by the tracing subscriber at startup
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Base log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "json", "compact" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Per-module level overrides, e.g. tokio_postgres: warn
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            modules: HashMap::new(),
        }
    }
}

/// Settings for verifying identity-provider tokens.
///
/// The API performs no credential handling itself; it verifies tokens issued
/// by the external identity provider and trusts the (identity, email) pair
/// they carry.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default)]
    pub issuer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvitationConfig {
    /// Base URL used to construct join links embedded in notifications
    #[serde(default = "default_invite_base_url")]
    pub base_url: String,
    #[serde(default = "default_invite_expiry_days")]
    pub expires_in_days: i64,
    /// Optional webhook endpoint for invitation notifications.
    /// When unset, notifications are logged and dropped.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            base_url: default_invite_base_url(),
            expires_in_days: default_invite_expiry_days(),
            webhook_url: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "crm_api".to_string()
}

fn default_db_user() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> usize {
    20
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_invite_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_invite_expiry_days() -> i64 {
    7
}
