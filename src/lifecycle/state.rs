use std::fmt;

/// Where the controller is in its lifecycle.
///
/// ```text
/// Uninitialized → Initializing → Ready → Running → Stopping → Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
    Running,
    Stopping,
    Stopped,
}

impl LifecycleState {
    pub fn can_start(self) -> bool {
        self == LifecycleState::Ready
    }

    /// Stop is accepted after a successful init, started or not.
    pub fn can_stop(self) -> bool {
        matches!(self, LifecycleState::Ready | LifecycleState::Running)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initializing => "initializing",
            LifecycleState::Ready => "ready",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
