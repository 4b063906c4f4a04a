//! Data-access capabilities.
//!
//! # Data Flow
//! ```text
//! Store (pool)
//!     → postgres.rs (one JSONB table per entity)
//!     → Repository<E> trait objects handed to services
//!
//! Tests / embedders:
//!     memory.rs (same traits, DashMap backed)
//! ```
//!
//! # Design Decisions
//! - Repositories never depend on each other
//! - Entity rows are stored as `(id BIGINT, data JSONB)`; the schema is owned by migrations
//! - Auth and reporting need queries a generic table cannot express, so they have their own traits

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Credential, Entity, Session, UtilizationRow};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("query failed: {0}")]
    Query(#[from] tokio_postgres::Error),
    #[error("malformed row in {table}: {source}")]
    Decode {
        table: &'static str,
        source: serde_json::Error,
    },
}

/// CRUD over one entity table.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    async fn list(&self) -> Result<Vec<E>, RepoError>;
    async fn get(&self, id: i64) -> Result<Option<E>, RepoError>;
    /// Insert or replace by id.
    async fn save(&self, entity: &E) -> Result<(), RepoError>;
    async fn delete(&self, id: i64) -> Result<bool, RepoError>;
}

/// Credentials and sessions.
#[async_trait]
pub trait AuthRepository: Send + Sync {
    async fn find_credential(&self, email: &str) -> Result<Option<Credential>, RepoError>;
    async fn save_session(&self, session: &Session) -> Result<(), RepoError>;
    async fn find_session(&self, token: &str) -> Result<Option<Session>, RepoError>;
    async fn delete_session(&self, token: &str) -> Result<(), RepoError>;
}

/// Aggregate queries backing the reports endpoints.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Headcount and currently allocated employees per department.
    async fn utilization(&self, on: chrono::NaiveDate) -> Result<Vec<UtilizationRow>, RepoError>;
}
