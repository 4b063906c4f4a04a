//! Route-scoped middleware and the global CORS policy.
//!
//! # Data Flow
//! ```text
//! request
//!     → CORS (whole router, installed at start)
//!     → per-route layers, first listed outermost: auth → role → validation
//!     → handler
//! ```

pub mod auth;
pub mod cors;
pub mod validation;

pub use auth::{require_role, require_session};
pub use cors::cors_layer;
pub use validation::validate_query;
