//! Recurring jobs on a timezone-bound cron clock.
//!
//! # Data Flow
//! ```text
//! JobRegistry (constructors)
//!     → Jobs (built once from config + services)
//!     → CronClock::build (one schedule per job, broken schedules skipped)
//!     → start: scheduler loop spawns one task per firing
//!     → stop: loop halted, in-flight callbacks awaited
//! ```
//!
//! # Design Decisions
//! - Timezone resolution failure falls back to UTC; punctuality is not safety-critical
//! - A malformed cron expression disables only its own job
//! - Each firing runs on its own task; the same job may overlap itself across ticks

pub mod clock;
pub mod jobs;

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::composition::Services;
use crate::config::AppConfig;

pub use clock::{CronClock, SchedulerError};

/// Zero-argument callback invoked by the clock on every firing.
pub type JobCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A recurring unit of work.
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    /// Six-field cron expression.
    fn schedule(&self) -> &str;

    /// Produce the callback the clock invokes. `ctx` is cancelled at shutdown.
    fn callback(&self, ctx: &CancellationToken) -> JobCallback;
}

/// Ordered collection of jobs.
pub type Jobs = Vec<Box<dyn Job>>;

/// Constructor for one job. `None` means the job is not configured or disabled.
pub type JobFactory = Box<dyn Fn(&AppConfig, &Services) -> Option<Box<dyn Job>> + Send + Sync>;

/// Registry of job constructors, evaluated once by the composition root.
#[derive(Default)]
pub struct JobRegistry {
    factories: Vec<JobFactory>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in jobs.
    pub fn with_builtin_jobs() -> Self {
        let mut registry = Self::new();
        registry
            .register(jobs::HrSyncJob::from_config)
            .register(jobs::NeedsBenchDigestJob::from_config)
            .register(jobs::BenchSyncJob::from_config)
            .register(jobs::DeallocationDigestJob::from_config);
        registry
    }

    pub fn register<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(&AppConfig, &Services) -> Option<Box<dyn Job>> + Send + Sync + 'static,
    {
        self.factories.push(Box::new(factory));
        self
    }

    pub fn build(&self, config: &AppConfig, services: &Services) -> Jobs {
        self.factories
            .iter()
            .filter_map(|f| f(config, services))
            .collect()
    }
}
