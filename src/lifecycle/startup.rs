//! Startup orchestration.
//!
//! # Responsibilities
//! - Load configuration and open the store (fatal on failure)
//! - Apply migrations and seed data, open the cache (logged on failure)
//! - Build the graph, warm caches, register routes, build the cron clock
//!
//! # Design Decisions
//! - Steps run in order, not concurrently; a fatal step ends init immediately
//! - Without a cache the process runs in cache-less mode

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::cache::{Cache, RedisCache};
use crate::composition::{Repositories, ServiceGraph};
use crate::config::{load_config, AppConfig};
use crate::engine::EngineRegistry;
use crate::http::{register_routes, HttpTransport};
use crate::lifecycle::controller::{App, AppError};
use crate::lifecycle::state::LifecycleState;
use crate::observability::logging::LogLevelHandle;
use crate::observability::metrics;
use crate::rpc::{self, RpcServer};
use crate::scheduler::{CronClock, JobRegistry};
use crate::store::{migrations, Store};

/// Inputs to [`App::init`].
pub struct InitOptions {
    pub config_path: PathBuf,
    /// Overrides `store.migrations.dir`.
    pub migrations_dir: Option<PathBuf>,
    /// Overrides `store.migrations.seed_dir`.
    pub seed_dir: Option<PathBuf>,
    pub log: LogLevelHandle,
    pub engines: EngineRegistry,
    pub jobs: JobRegistry,
    state: watch::Sender<LifecycleState>,
}

impl InitOptions {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            migrations_dir: None,
            seed_dir: None,
            log: LogLevelHandle::detached(),
            engines: EngineRegistry::new(),
            jobs: JobRegistry::with_builtin_jobs(),
            state: watch::channel(LifecycleState::Uninitialized).0,
        }
    }

    /// Follow the state of the app these options build, from `Uninitialized` on.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }
}

impl App {
    /// Run every init step against real infrastructure.
    pub async fn init(opts: InitOptions) -> Result<App, AppError> {
        opts.state.send_replace(LifecycleState::Initializing);
        let config = load_config(&opts.config_path).map_err(|e| {
            tracing::error!(path = %opts.config_path.display(), error = %e, "Failed to load configuration");
            AppError::from(e)
        })?;
        opts.log.set_level(&config.logging.level);
        tracing::info!(path = %opts.config_path.display(), "Configuration loaded");

        if config.observability.metrics_enabled {
            match config.observability.metrics_address.parse::<SocketAddr>() {
                Ok(addr) => metrics::init_metrics(addr),
                Err(e) => tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    error = %e,
                    "Failed to parse metrics address"
                ),
            }
        }

        let store = Store::connect(&config.store).await.map_err(|e| {
            tracing::error!(
                host = %config.store.host,
                port = config.store.port,
                error = %e,
                "Failed to connect to store"
            );
            AppError::from(e)
        })?;

        let migrations_dir = opts
            .migrations_dir
            .unwrap_or_else(|| PathBuf::from(&config.store.migrations.dir));
        let seed_dir = opts
            .seed_dir
            .unwrap_or_else(|| PathBuf::from(&config.store.migrations.seed_dir));
        prepare_schema(&store, &config, &migrations_dir, &seed_dir).await;

        let cache = open_cache(&config).await;
        let graph = ServiceGraph::build_with(
            &config,
            &Repositories::postgres(&store),
            cache,
            &opts.engines,
            &opts.jobs,
        );
        App::assemble(graph, opts.state).await
    }

    /// Finish init from an already built graph: warm caches, register routes,
    /// build the cron clock.
    pub async fn from_graph(graph: ServiceGraph) -> Result<App, AppError> {
        App::assemble(graph, watch::channel(LifecycleState::Initializing).0).await
    }

    async fn assemble(graph: ServiceGraph, state: watch::Sender<LifecycleState>) -> Result<App, AppError> {
        state.send_replace(LifecycleState::Initializing);
        let config = Arc::clone(&graph.config);
        let services = &graph.services;

        if config.enabled.startup_refresh {
            if let Err(e) = services.employee.refresh(Utc::now().date_naive()).await {
                tracing::warn!(error = %e, "Startup employee refresh failed");
            }
        }
        if let Err(e) = services.metadata.reload().await {
            tracing::warn!(error = %e, "Metadata cache warm-up failed");
        }

        let routes = register_routes(&config, services)?;
        let http = HttpTransport::new(routes, &config.http, config.enabled.http_plaintext);
        let rpc = RpcServer::new(&config.rpc, rpc::services(services));

        let ctx = CancellationToken::new();
        let clock = match CronClock::build(&graph.jobs, &config.scheduler.timezone, &ctx).await {
            Ok(clock) => Some(clock),
            Err(e) => {
                tracing::error!(error = %e, "Cron clock unavailable, jobs will not run");
                None
            }
        };

        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        tracing::info!(
            engines = graph.engines.len(),
            jobs = graph.jobs.len(),
            cached_auth = services.auth.is_cached(),
            "Application ready"
        );
        state.send_replace(LifecycleState::Ready);
        Ok(App {
            state,
            transition: Mutex::new(()),
            graph: Arc::new(graph),
            http,
            rpc,
            clock: Mutex::new(clock),
            ctx,
            fatal_tx,
            fatal_rx: Mutex::new(Some(fatal_rx)),
        })
    }
}

async fn prepare_schema(store: &Store, config: &AppConfig, migrations_dir: &Path, seed_dir: &Path) {
    if let Err(e) = migrations::migrate(store, &config.store.migrations, migrations_dir).await {
        tracing::error!(dir = %migrations_dir.display(), error = %e, "Migrations failed");
    }
    // Seeding a rolled-back schema would only fail file by file.
    if config.store.migrations.down {
        return;
    }
    if let Err(e) = migrations::seed(store, seed_dir).await {
        tracing::error!(dir = %seed_dir.display(), error = %e, "Seeding failed");
    }
}

async fn open_cache(config: &AppConfig) -> Option<Arc<dyn Cache>> {
    match RedisCache::connect(&config.cache).await {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            tracing::warn!(url = %config.cache.url, error = %e, "Cache unavailable, running cache-less");
            None
        }
    }
}
