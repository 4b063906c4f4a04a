//! Network plumbing shared by the transports.
//!
//! # Data Flow
//! ```text
//! RPC:
//!     listener.rs (bind, accept loop, connection limit)
//!     → connection.rs (per-connection ids, in-flight call tracking)
//!
//! HTTP over TLS:
//!     tls.rs (certificate + key → rustls config)
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - In-flight work is counted so shutdown can wait for it

pub mod connection;
pub mod listener;
pub mod tls;
