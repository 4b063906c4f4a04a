//! Composition root.
//!
//! # Data Flow
//! ```text
//! Store handle (or nothing, for in-memory)
//!     → Repositories (one capability per entity)
//!     → Services (each holds exactly the repositories it declares)
//!     → Engines / Jobs (built from registries over the finished services)
//!     → ServiceGraph (shared read-only behind Arc)
//! ```
//!
//! # Design Decisions
//! - Dependency edges are struct fields; there is no runtime container
//! - Building runs no business logic and touches no network
//! - The graph is never mutated after the controller finishes `init`

use std::fmt;
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::AppConfig;
use crate::domain::{BenchEntry, Client, Employee, MetadataEntry, Need, Project, Tagging};
use crate::engine::{EngineRegistry, Engines};
use crate::repo::memory::{MemoryAuthRepository, MemoryReportRepository, MemoryRepository};
use crate::repo::postgres::{PgAuthRepository, PgReportRepository, PgRepository};
use crate::repo::{AuthRepository, ReportRepository, Repository};
use crate::scheduler::{JobRegistry, Jobs};
use crate::service::{
    AuthService, BenchService, ClientService, EmployeeService, MetadataService, NeedService,
    NotificationService, ProjectService, ReportService, TaggingService,
};
use crate::store::Store;

/// One data-access capability per entity.
#[derive(Clone)]
pub struct Repositories {
    pub auth: Arc<dyn AuthRepository>,
    pub clients: Arc<dyn Repository<Client>>,
    pub projects: Arc<dyn Repository<Project>>,
    pub employees: Arc<dyn Repository<Employee>>,
    pub bench: Arc<dyn Repository<BenchEntry>>,
    pub needs: Arc<dyn Repository<Need>>,
    pub taggings: Arc<dyn Repository<Tagging>>,
    pub metadata: Arc<dyn Repository<MetadataEntry>>,
    pub reports: Arc<dyn ReportRepository>,
}

impl Repositories {
    /// Repositories over the shared connection pool.
    pub fn postgres(store: &Store) -> Self {
        Self {
            auth: Arc::new(PgAuthRepository::new(store.clone())),
            clients: Arc::new(PgRepository::<Client>::new(store.clone())),
            projects: Arc::new(PgRepository::<Project>::new(store.clone())),
            employees: Arc::new(PgRepository::<Employee>::new(store.clone())),
            bench: Arc::new(PgRepository::<BenchEntry>::new(store.clone())),
            needs: Arc::new(PgRepository::<Need>::new(store.clone())),
            taggings: Arc::new(PgRepository::<Tagging>::new(store.clone())),
            metadata: Arc::new(PgRepository::<MetadataEntry>::new(store.clone())),
            reports: Arc::new(PgReportRepository::new(store.clone())),
        }
    }

    /// Process-local repositories. The report repository reads the same
    /// employee and tagging tables the others write.
    pub fn in_memory() -> Self {
        let employees = MemoryRepository::<Employee>::new();
        let taggings = MemoryRepository::<Tagging>::new();
        Self {
            auth: Arc::new(MemoryAuthRepository::new()),
            clients: Arc::new(MemoryRepository::<Client>::new()),
            projects: Arc::new(MemoryRepository::<Project>::new()),
            employees: Arc::new(employees.clone()),
            bench: Arc::new(MemoryRepository::<BenchEntry>::new()),
            needs: Arc::new(MemoryRepository::<Need>::new()),
            taggings: Arc::new(taggings.clone()),
            metadata: Arc::new(MemoryRepository::<MetadataEntry>::new()),
            reports: Arc::new(MemoryReportRepository::new(employees, taggings)),
        }
    }

    /// Replace the auth capability.
    pub fn with_auth(mut self, auth: Arc<dyn AuthRepository>) -> Self {
        self.auth = auth;
        self
    }
}

/// One business capability per entity, plus notifications.
#[derive(Clone)]
pub struct Services {
    pub auth: Arc<AuthService>,
    pub client: Arc<ClientService>,
    pub project: Arc<ProjectService>,
    pub employee: Arc<EmployeeService>,
    pub bench: Arc<BenchService>,
    pub need: Arc<NeedService>,
    pub tagging: Arc<TaggingService>,
    pub metadata: Arc<MetadataService>,
    pub notifications: Arc<NotificationService>,
    pub report: Arc<ReportService>,
}

impl Services {
    pub fn build(config: &AppConfig, repos: &Repositories, cache: Option<Arc<dyn Cache>>) -> Self {
        let r = repos;
        Self {
            auth: Arc::new(AuthService::new(&config.auth, r.auth.clone(), cache)),
            client: Arc::new(ClientService::new(r.clients.clone(), r.projects.clone())),
            project: Arc::new(ProjectService::new(
                r.projects.clone(),
                r.clients.clone(),
                r.taggings.clone(),
                r.needs.clone(),
            )),
            employee: Arc::new(EmployeeService::new(
                r.employees.clone(),
                r.taggings.clone(),
                r.bench.clone(),
                r.metadata.clone(),
            )),
            bench: Arc::new(BenchService::new(
                r.bench.clone(),
                r.taggings.clone(),
                r.employees.clone(),
                r.needs.clone(),
            )),
            need: Arc::new(NeedService::new(r.needs.clone(), r.projects.clone(), r.employees.clone())),
            tagging: Arc::new(TaggingService::new(
                r.taggings.clone(),
                r.projects.clone(),
                r.employees.clone(),
            )),
            metadata: Arc::new(MetadataService::new(r.metadata.clone())),
            notifications: Arc::new(NotificationService::new(&config.notifications)),
            report: Arc::new(ReportService::new(r.reports.clone())),
        }
    }
}

/// The fully wired, immutable dependency graph.
pub struct ServiceGraph {
    pub config: Arc<AppConfig>,
    pub services: Services,
    pub engines: Engines,
    pub jobs: Jobs,
}

impl ServiceGraph {
    /// Build with the built-in jobs and no engines.
    pub fn build(config: &AppConfig, repos: &Repositories, cache: Option<Arc<dyn Cache>>) -> Self {
        Self::build_with(
            config,
            repos,
            cache,
            &EngineRegistry::new(),
            &JobRegistry::with_builtin_jobs(),
        )
    }

    pub fn build_with(
        config: &AppConfig,
        repos: &Repositories,
        cache: Option<Arc<dyn Cache>>,
        engines: &EngineRegistry,
        jobs: &JobRegistry,
    ) -> Self {
        let services = Services::build(config, repos, cache);
        let engines = engines.build(config, &services);
        let jobs = jobs.build(config, &services);
        tracing::debug!(engines = engines.len(), jobs = jobs.len(), "Service graph built");
        Self {
            config: Arc::new(config.clone()),
            services,
            engines,
            jobs,
        }
    }
}

impl fmt::Debug for ServiceGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceGraph")
            .field("engines", &self.engines)
            .field("jobs", &self.jobs.iter().map(|j| j.name()).collect::<Vec<_>>())
            .field("cached_auth", &self.services.auth.is_cached())
            .finish()
    }
}
