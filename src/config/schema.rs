//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the roster server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Relational store connection settings.
    pub store: StoreConfig,

    /// Cache endpoint settings.
    pub cache: CacheConfig,

    /// Logging verbosity.
    pub logging: LoggingConfig,

    /// Feature toggles.
    pub enabled: FeatureToggles,

    /// Request/response transport.
    pub http: HttpConfig,

    /// Remote-procedure transport.
    pub rpc: RpcConfig,

    /// Cron clock settings.
    pub scheduler: SchedulerConfig,

    /// Per-job schedules keyed by job name.
    pub jobs: BTreeMap<String, JobConfig>,

    /// Session settings for the auth service.
    pub auth: AuthConfig,

    pub notifications: NotificationConfig,

    pub observability: ObservabilityConfig,
}

/// Relational store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Database name.
    pub name: String,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Pool size.
    pub max_connections: usize,
    pub migrations: MigrationConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            user: "roster".to_string(),
            password: String::new(),
            name: "roster".to_string(),
            connect_timeout_secs: 5,
            max_connections: 16,
            migrations: MigrationConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Schema migration options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// SQL dialect of the migration files. Only `postgres` is supported.
    pub dialect: String,
    /// Log every applied file at info level.
    pub verbose: bool,
    /// Roll applied migrations back instead of applying pending ones.
    pub down: bool,
    /// Directory holding `<version>.up.sql` / `<version>.down.sql` files.
    pub dir: String,
    /// Directory holding seed `.sql` files, applied in file name order.
    pub seed_dir: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            dialect: "postgres".to_string(),
            verbose: false,
            down: false,
            dir: "migrations".to_string(),
            seed_dir: "seed".to_string(),
        }
    }
}

/// Cache endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Redis URL (e.g., "redis://127.0.0.1:6379").
    pub url: String,
    pub connect_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            connect_timeout_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Emit JSON lines instead of the human readable format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Feature toggles.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeatureToggles {
    /// Serve HTTP over plaintext. When false the TLS paths are required.
    pub http_plaintext: bool,
    /// Enforce bearer session tokens on protected routes.
    pub auth: bool,
    /// Run the employee refresh once during startup.
    pub startup_refresh: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            http_plaintext: true,
            auth: true,
            startup_refresh: false,
        }
    }
}

/// Request/response transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listen port on all interfaces. `0` picks an ephemeral port.
    pub port: u16,
    /// Read timeout applied to every request, in seconds.
    pub request_timeout_secs: u64,
    /// Upper bound for draining in-flight requests at shutdown, in seconds.
    pub shutdown_timeout_secs: u64,
    /// Certificate and key used when plaintext is disabled.
    pub tls: TlsConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            request_timeout_secs: 30,
            shutdown_timeout_secs: 10,
            tls: TlsConfig::default(),
        }
    }
}

/// TLS configuration for the HTTP listener.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Remote-procedure transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    pub host: String,
    pub port: u16,
    /// Maximum concurrent RPC connections (backpressure).
    pub max_connections: usize,
    /// Longest accepted request line in bytes; longer lines close the connection.
    pub max_frame_bytes: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
            max_connections: 1_024,
            max_frame_bytes: 1_048_576,
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl RpcConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// IANA zone the cron expressions are evaluated in.
    pub timezone: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: "Asia/Kolkata".to_string(),
        }
    }
}

/// Settings of a single recurring job.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JobConfig {
    /// Six-field cron expression (sec min hour day-of-month month day-of-week).
    pub schedule: String,
    pub enabled: bool,
    /// Look-ahead window for jobs reporting on upcoming dates.
    pub window_days: u32,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            schedule: String::new(),
            enabled: true,
            window_days: 14,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Lifetime of a session token, in seconds.
    pub session_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 8 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub sender: String,
    pub recipients: Vec<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sender: "roster@localhost".to_string(),
            recipients: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
