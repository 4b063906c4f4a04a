//! Relational store connection.
//!
//! # Data Flow
//! ```text
//! StoreConfig
//!     → connect() (build pool, check out one connection to validate)
//!     → migrations.rs (schema versions, seed data)
//!     → Store handle shared by every repository
//! ```
//!
//! # Design Decisions
//! - One pool per process; repositories clone the handle, never rebuild it
//! - Connect failure is reported to the caller, which decides it is fatal

pub mod migrations;

use deadpool_postgres::{
    BuildError, Manager, ManagerConfig, Object, Pool, PoolError, RecyclingMethod, Runtime,
};
use thiserror::Error;
use tokio_postgres::NoTls;

use crate::config::StoreConfig;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to build connection pool: {0}")]
    Build(#[from] BuildError),
    #[error("failed to check out a connection: {0}")]
    Pool(#[from] PoolError),
    #[error("query failed: {0}")]
    Query(#[from] tokio_postgres::Error),
    #[error("migration error: {0}")]
    Migration(String),
}

/// Shared handle to the connection pool.
#[derive(Clone)]
pub struct Store {
    pool: Pool,
}

impl Store {
    /// Build the pool without touching the network.
    pub fn lazy(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&config.host)
            .port(config.port)
            .user(&config.user)
            .password(&config.password)
            .dbname(&config.name)
            .connect_timeout(config.connect_timeout())
            .application_name("roster-server");

        let manager = Manager::from_config(
            pg,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(config.connect_timeout()))
            .create_timeout(Some(config.connect_timeout()))
            .build()?;

        Ok(Self { pool })
    }

    /// Build the pool and validate it by opening one connection.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let store = Self::lazy(config)?;
        let client = store.client().await?;
        client.simple_query("SELECT 1").await?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            max_connections = config.max_connections,
            "Store connected"
        );
        Ok(store)
    }

    pub async fn client(&self) -> Result<Object, StoreError> {
        Ok(self.pool.get().await?)
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}
