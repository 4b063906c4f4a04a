//! Business services, one per entity.
//!
//! Each service holds exactly the repositories (and sibling services) named in
//! its constructor. The composition root wires them once; afterwards they are
//! shared read-only behind `Arc`.

pub mod auth;
pub mod bench;
pub mod client;
pub mod employee;
pub mod metadata;
pub mod need;
pub mod notify;
pub mod project;
pub mod report;
pub mod tagging;

use thiserror::Error;

use crate::repo::RepoError;

pub use auth::AuthService;
pub use bench::BenchService;
pub use client::ClientService;
pub use employee::EmployeeService;
pub use metadata::{MetadataFilter, MetadataService};
pub use need::NeedService;
pub use notify::{Notification, NotificationService};
pub use project::ProjectService;
pub use report::ReportService;
pub use tagging::TaggingService;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
