//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level at runtime, once the configuration has been read
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` wins over the configured level when set

use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Handle used to change the active log filter after startup.
#[derive(Clone)]
pub struct LogLevelHandle {
    inner: Option<reload::Handle<EnvFilter, Registry>>,
}

impl LogLevelHandle {
    /// A handle that ignores level changes (tests, embedders with their own subscriber).
    pub fn detached() -> Self {
        Self { inner: None }
    }

    /// Apply the configured level unless `RUST_LOG` is present.
    pub fn set_level(&self, level: &str) {
        let Some(handle) = &self.inner else {
            return;
        };
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return;
        }
        match EnvFilter::try_new(level) {
            Ok(filter) => {
                if let Err(e) = handle.reload(filter) {
                    tracing::warn!(error = %e, "Failed to apply log level");
                } else {
                    tracing::debug!(level, "Log level applied");
                }
            }
            Err(e) => tracing::warn!(level, error = %e, "Invalid log level, keeping current filter"),
        }
    }
}

/// Install the global subscriber and return a handle for later level changes.
pub fn init_logging(json: bool) -> LogLevelHandle {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "roster=info,roster_server=info,tower_http=info".into());
    let (filter, handle) = reload::Layer::new(filter);

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };

    match installed {
        Ok(()) => LogLevelHandle { inner: Some(handle) },
        Err(_) => LogLevelHandle::detached(),
    }
}
