//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Init (startup.rs):
//!     Load config → Connect store → Migrate + seed → Open cache
//!     → Build graph → Warm caches → Register routes → Build cron clock → Ready
//!
//! Start (controller.rs):
//!     Engines → HTTP → RPC → Cron clock → Running
//!
//! Stop (shutdown.rs):
//!     HTTP drain (deadline) → RPC drain → Engines → Cron clock → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Config and store failures end init; everything later degrades with a log line
//! - Stop runs every step regardless of earlier failures
//! - Only the HTTP drain has a deadline

pub mod controller;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use controller::{App, AppError};
pub use signals::shutdown_signal;
pub use startup::InitOptions;
pub use state::LifecycleState;
