//! Staffing roster backend.
//!
//! A composition kernel wires configuration, the relational store, an
//! optional cache, repositories and services into one immutable graph, then
//! drives it through an explicit lifecycle with two transports and a cron clock.
//!
//! ```text
//!   config ─▶ store ─▶ migrations/seed ─▶ cache (optional)
//!                            │
//!                            ▼
//!         repositories ─▶ services ─▶ engines + jobs   (composition)
//!                            │
//!          ┌─────────────────┼──────────────────┐
//!          ▼                 ▼                  ▼
//!   http (registrar,   rpc (line-framed     scheduler
//!   middleware, TLS)   JSON over TCP)       (cron clock)
//!          └─────────────────┴──────────────────┘
//!                            │
//!                        lifecycle (init → start → stop)
//! ```

// Core subsystems
pub mod composition;
pub mod config;
pub mod domain;
pub mod lifecycle;

// Storage
pub mod cache;
pub mod repo;
pub mod store;

// Business logic
pub mod engine;
pub mod scheduler;
pub mod service;

// Transports
pub mod http;
pub mod net;
pub mod rpc;

// Cross-cutting concerns
pub mod observability;

pub use composition::{Repositories, ServiceGraph, Services};
pub use config::AppConfig;
pub use lifecycle::{App, AppError, InitOptions, LifecycleState};
