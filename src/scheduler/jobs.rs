//! Built-in recurring jobs.
//!
//! Every job reads its `[jobs.<name>]` section; a missing section or
//! `enabled = false` means the job is not built at all.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::composition::Services;
use crate::config::{AppConfig, JobConfig};
use crate::scheduler::{Job, JobCallback};
use crate::service::{
    BenchService, EmployeeService, MetadataService, NeedService, Notification, NotificationService,
    ProjectService, TaggingService,
};

/// Config section for `name` when present and enabled.
fn enabled_section<'a>(config: &'a AppConfig, name: &str) -> Option<&'a JobConfig> {
    match config.jobs.get(name) {
        Some(job) if job.enabled => Some(job),
        Some(_) => {
            tracing::info!(job = name, "Job disabled");
            None
        }
        None => None,
    }
}

fn zone(config: &AppConfig) -> Tz {
    config.scheduler.timezone.parse().unwrap_or(Tz::UTC)
}

/// Calendar date in the clock's zone.
fn today(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// Refreshes reference data, then reconciles the employee directory with it.
pub struct HrSyncJob {
    schedule: String,
    tz: Tz,
    metadata: Arc<MetadataService>,
    employees: Arc<EmployeeService>,
}

impl HrSyncJob {
    pub const NAME: &'static str = "hr-sync";

    pub fn from_config(config: &AppConfig, services: &Services) -> Option<Box<dyn Job>> {
        let section = enabled_section(config, Self::NAME)?;
        Some(Box::new(Self {
            schedule: section.schedule.clone(),
            tz: zone(config),
            metadata: Arc::clone(&services.metadata),
            employees: Arc::clone(&services.employee),
        }))
    }
}

impl Job for HrSyncJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn schedule(&self) -> &str {
        &self.schedule
    }

    fn callback(&self, ctx: &CancellationToken) -> JobCallback {
        let ctx = ctx.clone();
        let tz = self.tz;
        let metadata = Arc::clone(&self.metadata);
        let employees = Arc::clone(&self.employees);
        Arc::new(move || {
            let ctx = ctx.clone();
            let metadata = Arc::clone(&metadata);
            let employees = Arc::clone(&employees);
            async move {
                if ctx.is_cancelled() {
                    return;
                }
                if let Err(e) = metadata.reload().await {
                    tracing::warn!(error = %e, "Metadata reload failed, using previous snapshot");
                }
                if let Err(e) = employees.refresh(today(tz)).await {
                    tracing::error!(error = %e, "Employee refresh failed");
                }
            }
            .boxed()
        })
    }
}

/// Mails the open needs next to the current bench roster.
pub struct NeedsBenchDigestJob {
    schedule: String,
    tz: Tz,
    notifications: Arc<NotificationService>,
    bench: Arc<BenchService>,
    needs: Arc<NeedService>,
}

impl NeedsBenchDigestJob {
    pub const NAME: &'static str = "needs-bench-digest";

    pub fn from_config(config: &AppConfig, services: &Services) -> Option<Box<dyn Job>> {
        let section = enabled_section(config, Self::NAME)?;
        Some(Box::new(Self {
            schedule: section.schedule.clone(),
            tz: zone(config),
            notifications: Arc::clone(&services.notifications),
            bench: Arc::clone(&services.bench),
            needs: Arc::clone(&services.need),
        }))
    }

    async fn run(bench: &BenchService, needs: &NeedService, notifications: &NotificationService, today: NaiveDate) {
        let roster = match bench.roster(today).await {
            Ok(roster) => roster,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load bench roster");
                return;
            }
        };
        let open = match needs.open().await {
            Ok(open) => open,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load open needs");
                return;
            }
        };

        let mut lines = Vec::with_capacity(open.len() + roster.members.len() + 2);
        lines.push(format!("Open needs ({})", open.len()));
        for view in &open {
            lines.push(format!(
                "  {} x{} on {}",
                view.need.skill,
                view.need.count,
                view.project.as_deref().unwrap_or("unknown project")
            ));
        }
        lines.push(format!("On bench ({})", roster.members.len()));
        for member in &roster.members {
            lines.push(format!("  {} ({} days)", member.employee.name, member.idle_days));
        }

        notifications.send(&Notification {
            subject: format!("Needs and bench for {today}"),
            lines,
        });
    }
}

impl Job for NeedsBenchDigestJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn schedule(&self) -> &str {
        &self.schedule
    }

    fn callback(&self, ctx: &CancellationToken) -> JobCallback {
        let ctx = ctx.clone();
        let tz = self.tz;
        let notifications = Arc::clone(&self.notifications);
        let bench = Arc::clone(&self.bench);
        let needs = Arc::clone(&self.needs);
        Arc::new(move || {
            let ctx = ctx.clone();
            let notifications = Arc::clone(&notifications);
            let bench = Arc::clone(&bench);
            let needs = Arc::clone(&needs);
            async move {
                if ctx.is_cancelled() {
                    return;
                }
                Self::run(&bench, &needs, &notifications, today(tz)).await;
            }
            .boxed()
        })
    }
}

/// Reconciles the bench against live allocations.
///
/// Taggings that point at inactive projects are reported; they still count as
/// allocations until someone closes them.
pub struct BenchSyncJob {
    schedule: String,
    tz: Tz,
    employees: Arc<EmployeeService>,
    taggings: Arc<TaggingService>,
    projects: Arc<ProjectService>,
}

impl BenchSyncJob {
    pub const NAME: &'static str = "bench-sync";

    pub fn from_config(config: &AppConfig, services: &Services) -> Option<Box<dyn Job>> {
        let section = enabled_section(config, Self::NAME)?;
        Some(Box::new(Self {
            schedule: section.schedule.clone(),
            tz: zone(config),
            employees: Arc::clone(&services.employee),
            taggings: Arc::clone(&services.tagging),
            projects: Arc::clone(&services.project),
        }))
    }

    async fn run(
        employees: &EmployeeService,
        taggings: &TaggingService,
        projects: &ProjectService,
        today: NaiveDate,
    ) {
        match (taggings.active_on(today).await, projects.list().await) {
            (Ok(active), Ok(projects)) => {
                let stale = active
                    .iter()
                    .filter(|t| !projects.iter().any(|p| p.id == t.project_id && p.active))
                    .count();
                if stale > 0 {
                    tracing::warn!(taggings = stale, "Active taggings on inactive projects");
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "Skipping stale tagging check");
            }
        }

        if let Err(e) = employees.refresh(today).await {
            tracing::error!(error = %e, "Bench sync failed");
        }
    }
}

impl Job for BenchSyncJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn schedule(&self) -> &str {
        &self.schedule
    }

    fn callback(&self, ctx: &CancellationToken) -> JobCallback {
        let ctx = ctx.clone();
        let tz = self.tz;
        let employees = Arc::clone(&self.employees);
        let taggings = Arc::clone(&self.taggings);
        let projects = Arc::clone(&self.projects);
        Arc::new(move || {
            let ctx = ctx.clone();
            let employees = Arc::clone(&employees);
            let taggings = Arc::clone(&taggings);
            let projects = Arc::clone(&projects);
            async move {
                if ctx.is_cancelled() {
                    return;
                }
                Self::run(&employees, &taggings, &projects, today(tz)).await;
            }
            .boxed()
        })
    }
}

/// Mails the taggings that end within the configured window.
pub struct DeallocationDigestJob {
    schedule: String,
    tz: Tz,
    window_days: u32,
    notifications: Arc<NotificationService>,
    taggings: Arc<TaggingService>,
}

impl DeallocationDigestJob {
    pub const NAME: &'static str = "deallocation-digest";

    pub fn from_config(config: &AppConfig, services: &Services) -> Option<Box<dyn Job>> {
        let section = enabled_section(config, Self::NAME)?;
        Some(Box::new(Self {
            schedule: section.schedule.clone(),
            tz: zone(config),
            window_days: section.window_days,
            notifications: Arc::clone(&services.notifications),
            taggings: Arc::clone(&services.tagging),
        }))
    }

    async fn run(
        taggings: &TaggingService,
        notifications: &NotificationService,
        today: NaiveDate,
        window_days: u32,
    ) {
        let ending = match taggings.ending_within(today, window_days).await {
            Ok(ending) => ending,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load ending taggings");
                return;
            }
        };
        if ending.is_empty() {
            tracing::debug!(window_days, "No deallocations in window");
            return;
        }

        let lines = ending
            .iter()
            .map(|view| {
                format!(
                    "{} leaves {} on {}",
                    view.employee.as_deref().unwrap_or("unknown employee"),
                    view.project.as_deref().unwrap_or("unknown project"),
                    view.tagging
                        .end_date
                        .map(|d| d.to_string())
                        .unwrap_or_default()
                )
            })
            .collect();
        notifications.send(&Notification {
            subject: format!("Deallocations in the next {window_days} days"),
            lines,
        });
    }
}

impl Job for DeallocationDigestJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn schedule(&self) -> &str {
        &self.schedule
    }

    fn callback(&self, ctx: &CancellationToken) -> JobCallback {
        let ctx = ctx.clone();
        let tz = self.tz;
        let window_days = self.window_days;
        let notifications = Arc::clone(&self.notifications);
        let taggings = Arc::clone(&self.taggings);
        Arc::new(move || {
            let ctx = ctx.clone();
            let notifications = Arc::clone(&notifications);
            let taggings = Arc::clone(&taggings);
            async move {
                if ctx.is_cancelled() {
                    return;
                }
                Self::run(&taggings, &notifications, today(tz), window_days).await;
            }
            .boxed()
        })
    }
}
