//! HTTP transport.
//!
//! # Responsibilities
//! - Wrap the registered routes in the shared layers (trace, request id, timeout, metrics, CORS)
//! - Bind plaintext or TLS per configuration and serve on a spawned task
//! - Drain in-flight requests on stop, bounded by the caller's deadline
//!
//! # Design Decisions
//! - `start` returns once the socket is bound; serving happens in the background
//! - TLS failures, at start or later while serving, are reported as fatal
//! - A drain that outlives the deadline is abandoned and the task aborted

use std::net::SocketAddr;
use std::path::Path;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::Request;
use axum::http::Request as HttpRequest;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::HttpConfig;
use crate::http::middleware::cors_layer;
use crate::http::request::{propagate_request_id, request_span, set_request_id};
use crate::net::tls::{load_tls_config, TlsError};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("failed to bind HTTP listener on {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),
    #[error("TLS server failed: {0}")]
    TlsServe(std::io::Error),
    #[error("HTTP transport already started")]
    AlreadyStarted,
}

impl HttpError {
    /// Whether the failure is on the TLS serving path.
    pub fn is_tls(&self) -> bool {
        matches!(self, HttpError::Tls(_) | HttpError::TlsServe(_))
    }
}

enum Shutdown {
    Plain(CancellationToken),
    Tls(axum_server::Handle),
}

struct Running {
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

/// The request/response transport.
pub struct HttpTransport {
    routes: Router,
    config: HttpConfig,
    plaintext: bool,
    running: Mutex<Option<Running>>,
    local_addr: std::sync::OnceLock<SocketAddr>,
}

impl HttpTransport {
    pub fn new(routes: Router, config: &HttpConfig, plaintext: bool) -> Self {
        Self {
            routes,
            config: config.clone(),
            plaintext,
            running: Mutex::new(None),
            local_addr: std::sync::OnceLock::new(),
        }
    }

    /// Address the listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    #[allow(deprecated)]
    fn build_app(&self) -> Router {
        self.routes
            .clone()
            .layer(middleware::from_fn(record_metrics))
            .layer(cors_layer())
            .layer(TimeoutLayer::new(self.config.request_timeout()))
            .layer(propagate_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|req: &HttpRequest<Body>| request_span(req)))
            .layer(set_request_id())
    }

    /// Bind and start serving. TLS failures after bind are sent on `fatal`.
    pub async fn start(&self, fatal: mpsc::UnboundedSender<HttpError>) -> Result<SocketAddr, HttpError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(HttpError::AlreadyStarted);
        }

        let address = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let app = self.build_app();

        let (addr, state) = if self.plaintext {
            self.start_plaintext(address, app).await?
        } else {
            self.start_tls(address, app, fatal).await?
        };

        let _ = self.local_addr.set(addr);
        *running = Some(state);
        tracing::info!(address = %addr, tls = !self.plaintext, "HTTP transport listening");
        Ok(addr)
    }

    async fn start_plaintext(&self, address: SocketAddr, app: Router) -> Result<(SocketAddr, Running), HttpError> {
        let bind_err = |source| HttpError::Bind {
            address: address.to_string(),
            source,
        };
        let listener = TcpListener::bind(address).await.map_err(bind_err)?;
        let addr = listener.local_addr().map_err(bind_err)?;

        let token = CancellationToken::new();
        let signal = token.clone();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move { signal.cancelled().await });
            if let Err(e) = serve.await {
                tracing::error!(error = %e, "HTTP server error");
            }
            tracing::info!("HTTP server stopped");
        });

        Ok((
            addr,
            Running {
                shutdown: Shutdown::Plain(token),
                task,
            },
        ))
    }

    async fn start_tls(
        &self,
        address: SocketAddr,
        app: Router,
        fatal: mpsc::UnboundedSender<HttpError>,
    ) -> Result<(SocketAddr, Running), HttpError> {
        let tls = load_tls_config(
            Path::new(&self.config.tls.cert_path),
            Path::new(&self.config.tls.key_path),
        )
        .await?;

        let handle = axum_server::Handle::new();
        let server = axum_server::bind_rustls(address, tls).handle(handle.clone());
        let mut task = tokio::spawn(async move {
            match server.serve(app.into_make_service()).await {
                Ok(()) => tracing::info!("HTTPS server stopped"),
                Err(e) => {
                    tracing::error!(error = %e, "HTTPS server failed");
                    let _ = fatal.send(HttpError::TlsServe(e));
                }
            }
        });

        let listening = tokio::select! {
            addr = handle.listening() => addr,
            _ = &mut task => None,
        };
        match listening {
            Some(addr) => Ok((
                addr,
                Running {
                    shutdown: Shutdown::Tls(handle),
                    task,
                },
            )),
            None => {
                task.abort();
                Err(HttpError::TlsServe(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    format!("HTTPS listener on {address} did not come up"),
                )))
            }
        }
    }

    /// Stop accepting and drain in-flight requests until `deadline`.
    ///
    /// Returns false if the deadline expired before the drain finished.
    pub async fn stop(&self, deadline: Instant) -> bool {
        let Some(Running { shutdown, mut task }) = self.running.lock().await.take() else {
            return true;
        };
        let remaining = deadline.saturating_duration_since(Instant::now());

        match shutdown {
            Shutdown::Plain(token) => token.cancel(),
            Shutdown::Tls(handle) => handle.graceful_shutdown(Some(remaining)),
        }

        match tokio::time::timeout(remaining, &mut task).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!(
                    waited_ms = remaining.as_millis() as u64,
                    "HTTP drain exceeded deadline, aborting open connections"
                );
                task.abort();
                false
            }
        }
    }
}

async fn record_metrics(req: Request, next: Next) -> Response {
    let start = std::time::Instant::now();
    let method = req.method().to_string();
    let response = next.run(req).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}

/// Default drain budget when the caller has none.
pub fn default_deadline(config: &HttpConfig) -> Instant {
    Instant::now() + config.shutdown_timeout().max(Duration::from_millis(1))
}
