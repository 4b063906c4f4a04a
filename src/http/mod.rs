//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (layers: request id, trace, timeout, CORS, metrics)
//!     → registrar.rs (path → first route whose method and query match)
//!     → middleware/ (route-scoped: session, role, validation)
//!     → handlers.rs (one service call)
//!     → response.rs (service errors → status + JSON)
//! ```

pub mod handlers;
pub mod middleware;
pub mod registrar;
pub mod request;
pub mod response;
pub mod routes;
pub mod server;

pub use registrar::{handler, layer, register, Endpoint, Route, RouteError, RouteLayer, RouteTable};
pub use request::X_REQUEST_ID;
pub use routes::register_routes;
pub use server::{HttpError, HttpTransport};
