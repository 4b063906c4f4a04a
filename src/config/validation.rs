//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check that the TLS paths exist when plaintext HTTP is disabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Cron expressions are NOT validated here; a broken schedule only disables its job

use std::fmt;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.store.host.trim().is_empty() {
        errors.push(ValidationError::new("store.host", "must not be empty"));
    }
    if config.store.name.trim().is_empty() {
        errors.push(ValidationError::new("store.name", "must not be empty"));
    }
    if config.store.port == 0 {
        errors.push(ValidationError::new("store.port", "must be non-zero"));
    }
    if config.store.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("store.connect_timeout_secs", "must be greater than 0"));
    }
    if config.store.max_connections == 0 {
        errors.push(ValidationError::new("store.max_connections", "must be greater than 0"));
    }
    if !config.store.migrations.dialect.eq_ignore_ascii_case("postgres") {
        errors.push(ValidationError::new(
            "store.migrations.dialect",
            format!("unsupported dialect '{}'", config.store.migrations.dialect),
        ));
    }

    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::new("http.request_timeout_secs", "must be greater than 0"));
    }
    if !config.enabled.http_plaintext {
        if config.http.tls.cert_path.is_empty() {
            errors.push(ValidationError::new(
                "http.tls.cert_path",
                "required when enabled.http_plaintext is false",
            ));
        }
        if config.http.tls.key_path.is_empty() {
            errors.push(ValidationError::new(
                "http.tls.key_path",
                "required when enabled.http_plaintext is false",
            ));
        }
    }

    if config.rpc.host.trim().is_empty() {
        errors.push(ValidationError::new("rpc.host", "must not be empty"));
    }
    if config.rpc.max_connections == 0 {
        errors.push(ValidationError::new("rpc.max_connections", "must be greater than 0"));
    }
    if config.rpc.max_frame_bytes == 0 {
        errors.push(ValidationError::new("rpc.max_frame_bytes", "must be greater than 0"));
    }

    for (name, job) in &config.jobs {
        if job.enabled && job.schedule.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("jobs.{}.schedule", name),
                "must not be empty for an enabled job",
            ));
        }
    }

    if config.auth.session_ttl_secs == 0 {
        errors.push(ValidationError::new("auth.session_ttl_secs", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
