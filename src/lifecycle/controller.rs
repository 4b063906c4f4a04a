//! The lifecycle controller.
//!
//! # Responsibilities
//! - Own the composed graph and both transports
//! - Sequence start: engines, HTTP, RPC, cron clock
//! - Surface fatal transport failures to the process
//!
//! # Design Decisions
//! - Only the controller decides whether a failure is fatal or logged
//! - A transport that fails to bind is skipped; the others still start
//! - TLS failures go to the fatal channel instead of failing `start`

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::composition::ServiceGraph;
use crate::config::ConfigError;
use crate::http::{HttpError, HttpTransport, RouteError};
use crate::lifecycle::state::LifecycleState;
use crate::rpc::RpcServer;
use crate::scheduler::{CronClock, SchedulerError};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),
    #[error("route registration failed: {0}")]
    Routes(#[from] RouteError),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error("cannot {op} while {state}")]
    InvalidState { op: &'static str, state: LifecycleState },
}

/// The running process: graph, transports, clock.
pub struct App {
    pub(crate) state: watch::Sender<LifecycleState>,
    /// Serializes start and stop.
    pub(crate) transition: Mutex<()>,
    pub(crate) graph: Arc<ServiceGraph>,
    pub(crate) http: HttpTransport,
    pub(crate) rpc: RpcServer,
    /// Built during init, started by `start`, taken by `stop`.
    pub(crate) clock: Mutex<Option<CronClock>>,
    /// Handed to engines and jobs; cancelled once everything stopped.
    pub(crate) ctx: CancellationToken,
    pub(crate) fatal_tx: mpsc::UnboundedSender<HttpError>,
    pub(crate) fatal_rx: Mutex<Option<mpsc::UnboundedReceiver<HttpError>>>,
}

impl App {
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Follow state changes from now on.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn graph(&self) -> &Arc<ServiceGraph> {
        &self.graph
    }

    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http.local_addr()
    }

    pub fn rpc_addr(&self) -> Option<SocketAddr> {
        self.rpc.local_addr()
    }

    /// Receiver for fatal transport failures. Only the first caller gets it.
    pub async fn take_fatal(&self) -> Option<mpsc::UnboundedReceiver<HttpError>> {
        self.fatal_rx.lock().await.take()
    }

    /// Start engines, both transports and the cron clock.
    ///
    /// Returns once listeners are bound and serve tasks spawned.
    pub async fn start(&self) -> Result<(), AppError> {
        let _transition = self.transition.lock().await;
        let state = self.state();
        if !state.can_start() {
            return Err(AppError::InvalidState { op: "start", state });
        }

        if let Err(e) = self.graph.engines.start(&self.ctx).await {
            tracing::error!(engine = e.engine(), error = %e, "Engine failed to start");
        }

        match self.http.start(self.fatal_tx.clone()).await {
            Ok(addr) => tracing::info!(address = %addr, "HTTP transport started"),
            Err(e) if e.is_tls() => {
                tracing::error!(error = %e, "HTTPS transport failed to start");
                let _ = self.fatal_tx.send(e);
            }
            Err(e) => tracing::error!(error = %e, "HTTP transport failed to start, skipping"),
        }

        match self.rpc.start().await {
            Ok(addr) => tracing::info!(address = %addr, "RPC transport started"),
            Err(e) => tracing::error!(error = %e, "RPC transport failed to start, skipping"),
        }

        if let Some(clock) = self.clock.lock().await.as_ref() {
            if let Err(e) = clock.start().await {
                tracing::error!(error = %e, "Cron clock failed to start");
            }
        }

        self.state.send_replace(LifecycleState::Running);
        tracing::info!("Application running");
        Ok(())
    }
}
