//! Connection identity and in-flight call tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count calls that are being served
//! - Let shutdown wait until that count reaches zero

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counts in-flight calls.
///
/// The count lives in a watch channel so waiters wake on every change instead
/// of polling.
#[derive(Debug, Clone)]
pub struct CallTracker {
    count: Arc<watch::Sender<u64>>,
}

impl CallTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { count: Arc::new(tx) }
    }

    /// Record a call. The returned guard ends it when dropped.
    pub fn track(&self) -> CallGuard {
        self.count.send_modify(|n| *n += 1);
        CallGuard {
            count: Arc::clone(&self.count),
        }
    }

    pub fn active(&self) -> u64 {
        *self.count.borrow()
    }

    /// Resolve once no call is in flight.
    pub async fn wait_for_drain(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in self, so the channel cannot close while we wait.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for CallTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for one in-flight call.
#[derive(Debug)]
pub struct CallGuard {
    count: Arc<watch::Sender<u64>>,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn call_tracker_counts() {
        let tracker = CallTracker::new();
        assert_eq!(tracker.active(), 0);

        let guard1 = tracker.track();
        let guard2 = tracker.track();
        assert_eq!(tracker.active(), 2);

        drop(guard1);
        assert_eq!(tracker.active(), 1);
        drop(guard2);
        assert_eq!(tracker.active(), 0);
    }

    #[tokio::test]
    async fn drain_waits_for_the_last_guard() {
        let tracker = CallTracker::new();
        let guard = tracker.track();

        let waiter = tokio::spawn({
            let tracker = tracker.clone();
            async move { tracker.wait_for_drain().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
