//! The cron clock.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono_tz::Tz;
use thiserror::Error;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler, JobSchedulerError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::observability::metrics;
use crate::scheduler::Job;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler error: {0}")]
    Scheduler(#[from] JobSchedulerError),
}

/// A single scheduler bound to one timezone.
pub struct CronClock {
    scheduler: JobScheduler,
    timezone: Tz,
    registered: Vec<String>,
    skipped: Vec<String>,
    /// Cancelled at stop; firings that observe it return immediately.
    halted: CancellationToken,
    in_flight: TaskTracker,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl CronClock {
    /// Resolve the zone and register every job, skipping those with malformed schedules.
    pub async fn build(jobs: &[Box<dyn Job>], timezone: &str, ctx: &CancellationToken) -> Result<Self, SchedulerError> {
        let timezone = resolve_timezone(timezone);
        let scheduler = JobScheduler::new().await?;
        let halted = CancellationToken::new();
        let in_flight = TaskTracker::new();

        let mut registered = Vec::new();
        let mut skipped = Vec::new();
        for job in jobs {
            let name = job.name().to_string();
            let callback = job.callback(ctx);
            let halted = halted.clone();
            let in_flight = in_flight.clone();
            let job_name = name.clone();

            let cron_job = CronJob::new_async_tz(job.schedule(), timezone, move |_id, _scheduler| {
                let callback = callback.clone();
                let halted = halted.clone();
                let in_flight = in_flight.clone();
                let name = job_name.clone();
                Box::pin(async move {
                    // Taken before the halt check so stop() waits for this firing.
                    let tracked = in_flight.token();
                    if halted.is_cancelled() {
                        return;
                    }
                    metrics::record_job_run(&name);
                    let span = tracing::info_span!("job", job = %name);
                    // Each firing runs on its own task so a slow callback never holds up the clock.
                    tokio::spawn(
                        async move {
                            let _tracked = tracked;
                            tracing::debug!("Job firing");
                            callback().await;
                        }
                        .instrument(span),
                    );
                })
            });

            let added = match cron_job {
                Ok(cron_job) => scheduler.add(cron_job).await.map(|_| ()),
                Err(e) => Err(e),
            };
            match added {
                Ok(()) => {
                    tracing::info!(job = %name, schedule = job.schedule(), "Job registered");
                    registered.push(name);
                }
                Err(e) => {
                    tracing::error!(job = %name, schedule = job.schedule(), error = ?e, "Failed to add job, skipping");
                    skipped.push(name);
                }
            }
        }

        Ok(Self {
            scheduler,
            timezone,
            registered,
            skipped,
            halted,
            in_flight,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Names of the jobs with an active schedule.
    pub fn registered(&self) -> &[String] {
        &self.registered
    }

    /// Names of the jobs whose schedule could not be added.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Begin evaluating schedules. Calling it again is a no-op.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.stopped.load(Ordering::SeqCst) || self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.scheduler.start().await?;
        tracing::info!(jobs = self.registered.len(), timezone = %self.timezone, "Cron clock started");
        Ok(())
    }

    /// Halt the clock and wait for callbacks that already fired. Calling it again is a no-op.
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.halted.cancel();

        let mut scheduler = self.scheduler.clone();
        let result = scheduler.shutdown().await;

        self.in_flight.close();
        self.in_flight.wait().await;
        tracing::info!("Cron clock stopped");
        result.map_err(SchedulerError::from)
    }
}

/// Parse an IANA zone name, falling back to UTC.
pub fn resolve_timezone(name: &str) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(e) => {
            tracing::error!(timezone = name, error = %e, "Failed to load location, falling back to UTC");
            Tz::UTC
        }
    }
}
