//! Remote-procedure transport.
//!
//! # Data Flow
//! ```text
//! TCP connection (bounded by rpc.max_connections)
//!     → server.rs (line framing, stop/drain bookkeeping)
//!     → protocol.rs (decode request, encode response or error)
//!     → roster.rs / metadata.rs (one service call)
//! ```

pub mod metadata;
pub mod protocol;
pub mod roster;
pub mod server;

use std::sync::Arc;

use crate::composition::Services;

pub use protocol::{RpcError, RpcRequest, RpcResponse};
pub use server::{RpcServer, RpcService};

/// The services exposed over RPC.
pub fn services(services: &Services) -> Vec<Arc<dyn RpcService>> {
    vec![
        Arc::new(roster::RosterRpc::new(services)),
        Arc::new(metadata::MetadataRpc::new(services)),
    ]
}
