//! Ordered shutdown.

use std::time::Instant;

use crate::lifecycle::controller::{App, AppError};
use crate::lifecycle::state::LifecycleState;

impl App {
    /// Stop everything in order: HTTP, RPC, engines, cron clock.
    ///
    /// Every step runs even if an earlier one failed. Only the HTTP drain is
    /// bounded by `deadline`.
    pub async fn stop(&self, deadline: Instant) -> Result<(), AppError> {
        let _transition = self.transition.lock().await;
        let state = self.state();
        if !state.can_stop() {
            return Err(AppError::InvalidState { op: "stop", state });
        }
        self.state.send_replace(LifecycleState::Stopping);
        tracing::info!("Shutting down");

        if !self.http.stop(deadline).await {
            tracing::warn!("HTTP transport did not drain before the deadline");
        }

        self.rpc.stop().await;

        if let Err(e) = self.graph.engines.stop(&self.ctx).await {
            tracing::error!(engine = e.engine(), error = %e, "Engine shutdown reported an error");
        }

        if let Some(clock) = self.clock.lock().await.take() {
            if let Err(e) = clock.stop().await {
                tracing::error!(error = %e, "Cron clock failed to stop cleanly");
            }
        }

        self.ctx.cancel();
        self.state.send_replace(LifecycleState::Stopped);
        tracing::info!("Shutdown complete");
        Ok(())
    }
}
