//! End-to-end lifecycle tests: init failures, start, serve, stop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::FutureExt;
use roster::engine::{BoxError, Engine, EngineRegistry};
use roster::scheduler::{Job, JobCallback, JobRegistry};
use roster::{App, AppError, InitOptions, LifecycleState, ServiceGraph};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

mod common;

#[tokio::test]
async fn missing_config_is_fatal() {
    let err = App::init(InitOptions::new("/nonexistent/roster.toml"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AppError::Config(_)));
}

#[tokio::test]
async fn invalid_config_is_fatal() {
    let (_dir, path) = common::write_config("[store]\nhost = \"\"\n");
    let err = App::init(InitOptions::new(path)).await.err().unwrap();
    assert!(matches!(err, AppError::Config(_)));
}

#[tokio::test]
async fn unreachable_store_ends_init_before_cache() {
    // Stands in for the cache; init must never get far enough to dial it.
    let cache = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let cache_port = cache.local_addr().unwrap().port();

    let (_dir, path) = common::write_config(&format!(
        r#"
[store]
host = "127.0.0.1"
port = 1
connect_timeout_secs = 1

[cache]
url = "redis://127.0.0.1:{cache_port}"
"#
    ));

    let err = App::init(InitOptions::new(path)).await.err().unwrap();
    assert!(matches!(err, AppError::Store(_)), "got {err}");

    let dialed = tokio::time::timeout(Duration::from_millis(300), cache.accept()).await;
    assert!(dialed.is_err(), "cache must not be contacted after a store failure");
}

#[tokio::test]
async fn serves_both_transports_then_stops() {
    let repos = common::seeded_repositories().await;
    let graph = ServiceGraph::build(&common::ephemeral_config(), &repos, None);
    let app = App::from_graph(graph).await.unwrap();
    assert_eq!(app.state(), LifecycleState::Ready);
    assert!(!app.graph().services.auth.is_cached());

    app.start().await.unwrap();
    assert_eq!(app.state(), LifecycleState::Running);
    let http = app.http_addr().unwrap();
    let rpc = app.rpc_addr().unwrap();

    let health = reqwest::get(common::http_url(http, "/health")).await.unwrap().status();
    assert_eq!(health, 200);

    // Cache-less sessions still work end to end.
    let client = reqwest::Client::new();
    let session: serde_json::Value = client
        .post(common::http_url(http, "/api/v1/auth/login"))
        .json(&json!({ "email": "admin@example.com", "password": "secret" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = session["token"].as_str().unwrap();
    let employees = client
        .get(common::http_url(http, "/api/v1/employees"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(employees.status(), 200);

    let response = common::rpc_call(
        rpc,
        json!({ "id": 1, "service": "metadata", "method": "get", "params": { "key": "department" } }),
    )
    .await;
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"][0]["value"], "eng");

    let response = common::rpc_call(rpc, json!({ "id": 2, "service": "roster", "method": "employees.get", "params": { "id": 1 } })).await;
    assert_eq!(response["result"]["name"], "Asha");

    app.stop(Instant::now() + Duration::from_secs(5)).await.unwrap();
    assert_eq!(app.state(), LifecycleState::Stopped);
    assert!(reqwest::get(common::http_url(http, "/health")).await.is_err());

    let again = app.start().await.unwrap_err();
    assert!(matches!(
        again,
        AppError::InvalidState { op: "start", state: LifecycleState::Stopped }
    ));
    assert!(app.stop(Instant::now()).await.is_err());
}

#[tokio::test]
async fn stop_without_start_is_accepted() {
    let repos = common::seeded_repositories().await;
    let graph = ServiceGraph::build(&common::ephemeral_config(), &repos, None);
    let app = App::from_graph(graph).await.unwrap();

    app.stop(Instant::now() + Duration::from_secs(1)).await.unwrap();
    assert_eq!(app.state(), LifecycleState::Stopped);
}

/// Appends `<name>:start` / `<name>:stop` to a shared log.
struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    fail_start: bool,
}

#[async_trait]
impl Engine for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    async fn start(&self, _ctx: &CancellationToken) -> Result<(), BoxError> {
        self.log.lock().unwrap().push(format!("{}:start", self.name));
        if self.fail_start {
            return Err("refused".into());
        }
        Ok(())
    }

    async fn stop(&self, ctx: &CancellationToken) -> Result<(), BoxError> {
        assert!(!ctx.is_cancelled(), "engines stop before the context is cancelled");
        self.log.lock().unwrap().push(format!("{}:stop", self.name));
        Ok(())
    }
}

#[tokio::test]
async fn engine_failure_does_not_block_transports() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut engines = EngineRegistry::new();
    for (name, fail_start) in [("ledger", false), ("mailer", true), ("indexer", false)] {
        let log = Arc::clone(&log);
        engines.register(move |_, _| {
            Box::new(Recorder {
                name,
                log: Arc::clone(&log),
                fail_start,
            })
        });
    }

    let repos = common::seeded_repositories().await;
    let graph = ServiceGraph::build_with(&common::ephemeral_config(), &repos, None, &engines, &JobRegistry::new());
    let app = App::from_graph(graph).await.unwrap();
    app.start().await.unwrap();
    assert!(app.http_addr().is_some());
    assert!(app.rpc_addr().is_some());

    app.stop(Instant::now() + Duration::from_secs(5)).await.unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "ledger:start",
            "mailer:start",
            "ledger:stop",
            "mailer:stop",
            "indexer:stop",
        ]
    );
}

/// Counts firings.
struct Ticker {
    fired: Arc<AtomicUsize>,
}

impl Job for Ticker {
    fn name(&self) -> &str {
        "ticker"
    }

    fn schedule(&self) -> &str {
        "* * * * * *"
    }

    fn callback(&self, _ctx: &CancellationToken) -> JobCallback {
        let fired = Arc::clone(&self.fired);
        Arc::new(move || {
            let fired = Arc::clone(&fired);
            async move {
                fired.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }
}

#[tokio::test]
async fn cron_clock_runs_until_stop() {
    let fired = Arc::new(AtomicUsize::new(0));
    let mut jobs = JobRegistry::new();
    {
        let fired = Arc::clone(&fired);
        jobs.register(move |_, _| {
            Some(Box::new(Ticker {
                fired: Arc::clone(&fired),
            }))
        });
    }

    let repos = common::seeded_repositories().await;
    let graph = ServiceGraph::build_with(&common::ephemeral_config(), &repos, None, &EngineRegistry::new(), &jobs);
    let app = App::from_graph(graph).await.unwrap();
    app.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    app.stop(Instant::now() + Duration::from_secs(5)).await.unwrap();
    let after_stop = fired.load(Ordering::SeqCst);
    assert!(after_stop >= 1, "job should have fired at least once");

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(fired.load(Ordering::SeqCst), after_stop);
}

#[tokio::test]
async fn init_reports_its_progress() {
    let opts = InitOptions::new("/nonexistent/roster.toml");
    let state = opts.subscribe();
    assert_eq!(*state.borrow(), LifecycleState::Uninitialized);

    assert!(App::init(opts).await.is_err());
    assert_eq!(*state.borrow(), LifecycleState::Initializing, "a failed init never reaches Ready");

    let repos = common::seeded_repositories().await;
    let app = App::from_graph(ServiceGraph::build(&common::ephemeral_config(), &repos, None))
        .await
        .unwrap();
    let mut state = app.subscribe();
    assert_eq!(*state.borrow_and_update(), LifecycleState::Ready);

    app.start().await.unwrap();
    assert!(state.has_changed().unwrap());
    assert_eq!(*state.borrow_and_update(), LifecycleState::Running);
    app.stop(Instant::now() + Duration::from_secs(5)).await.unwrap();
    assert_eq!(*state.borrow_and_update(), LifecycleState::Stopped);
}

#[tokio::test]
async fn taken_http_port_skips_only_http() {
    let squatter = TcpListener::bind("0.0.0.0:0").await.unwrap();
    let mut config = common::ephemeral_config();
    config.http.port = squatter.local_addr().unwrap().port();

    let repos = common::seeded_repositories().await;
    let app = App::from_graph(ServiceGraph::build(&config, &repos, None)).await.unwrap();
    let mut fatal = app.take_fatal().await.unwrap();
    app.start().await.unwrap();

    assert_eq!(app.state(), LifecycleState::Running);
    assert!(app.http_addr().is_none());
    let rpc = app.rpc_addr().unwrap();
    assert!(fatal.try_recv().is_err(), "a plaintext bind failure is not fatal");

    let response = common::rpc_call(rpc, json!({ "id": 3, "service": "roster", "method": "employees.get", "params": { "id": 1 } })).await;
    assert_eq!(response["result"]["name"], "Asha");

    app.stop(Instant::now() + Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn tls_start_failure_is_fatal() {
    let mut config = common::ephemeral_config();
    config.enabled.http_plaintext = false;
    config.http.tls.cert_path = "/nonexistent/server.crt".into();
    config.http.tls.key_path = "/nonexistent/server.key".into();

    let repos = common::seeded_repositories().await;
    let app = App::from_graph(ServiceGraph::build(&config, &repos, None)).await.unwrap();
    let mut fatal = app.take_fatal().await.unwrap();
    assert!(app.take_fatal().await.is_none());

    app.start().await.unwrap();
    let err = fatal.try_recv().expect("TLS failure should reach the fatal channel");
    assert!(err.is_tls(), "got {err}");
    assert!(app.http_addr().is_none());
    assert!(app.rpc_addr().is_some());

    app.stop(Instant::now() + Duration::from_secs(5)).await.unwrap();
}
