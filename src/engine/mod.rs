//! Long-running engines.
//!
//! # Responsibilities
//! - Uniform start/stop contract for optional background subsystems
//! - Ordered start that fails fast on the first error
//! - Ordered stop that always reaches every engine
//!
//! # Design Decisions
//! - No rollback on a failed start; the outer shutdown path calls `stop`
//! - `stop` logs every failure and reports only the last one
//! - Engines are produced by registered constructors, so adding one does not touch the controller

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::composition::Services;
use crate::config::AppConfig;

/// Boxed error returned by an individual engine.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A long-running subsystem with an explicit lifecycle.
#[async_trait]
pub trait Engine: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self, ctx: &CancellationToken) -> Result<(), BoxError>;

    async fn stop(&self, ctx: &CancellationToken) -> Result<(), BoxError>;
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("error starting engine({name}): {source}")]
    Start { name: String, source: BoxError },
    #[error("error stopping engine({name}): {source}")]
    Stop { name: String, source: BoxError },
}

impl EngineError {
    /// Name of the engine that failed.
    pub fn engine(&self) -> &str {
        match self {
            EngineError::Start { name, .. } | EngineError::Stop { name, .. } => name,
        }
    }
}

/// Ordered, immutable-after-build collection of engines.
#[derive(Default)]
pub struct Engines {
    engines: Vec<Box<dyn Engine>>,
}

impl Engines {
    pub fn new(engines: Vec<Box<dyn Engine>>) -> Self {
        Self { engines }
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    /// Start every engine in registration order, stopping at the first failure.
    pub async fn start(&self, ctx: &CancellationToken) -> Result<(), EngineError> {
        for engine in &self.engines {
            engine.start(ctx).await.map_err(|source| EngineError::Start {
                name: engine.name().to_string(),
                source,
            })?;
            tracing::info!(engine = engine.name(), "Engine started");
        }
        Ok(())
    }

    /// Stop every engine, continuing past failures. Returns the last failure.
    pub async fn stop(&self, ctx: &CancellationToken) -> Result<(), EngineError> {
        let mut last_err = None;
        for engine in &self.engines {
            match engine.stop(ctx).await {
                Ok(()) => tracing::info!(engine = engine.name(), "Engine stopped"),
                Err(source) => {
                    let err = EngineError::Stop {
                        name: engine.name().to_string(),
                        source,
                    };
                    tracing::error!(error = %err, "Engine failed to stop");
                    last_err = Some(err);
                }
            }
        }
        match last_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Engines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engines").field("engines", &self.names()).finish()
    }
}

/// Constructor for one engine, given the finished configuration and services.
pub type EngineFactory = Box<dyn Fn(&AppConfig, &Services) -> Box<dyn Engine> + Send + Sync>;

/// Registry of engine constructors, evaluated once by the composition root.
#[derive(Default)]
pub struct EngineRegistry {
    factories: Vec<EngineFactory>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(&AppConfig, &Services) -> Box<dyn Engine> + Send + Sync + 'static,
    {
        self.factories.push(Box::new(factory));
        self
    }

    pub fn build(&self, config: &AppConfig, services: &Services) -> Engines {
        Engines::new(self.factories.iter().map(|f| f(config, services)).collect())
    }
}
