//! Internal connection pool implementation

use std::time::Duration;

use sqlx::{
    Pool, Postgres,
    migrate::{MigrateError, Migrator},
    postgres::PgPoolOptions,
};
use tracing::instrument;

/// Errors that can occur when connecting to the job store.
#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    /// Error connecting to the job store.
    #[error("Error connecting to job store: {0}")]
    ConnectionError(#[source] sqlx::Error),

    /// An error occurred while running migrations.
    #[error("Error running migrations: {0}")]
    MigrationFailed(#[source] MigrateError),
}

/// A connection pool to the job store.
#[derive(Debug, Clone)]
pub struct DbConnPool(Pool<Postgres>);

impl DbConnPool {
    /// Set up a connection pool to the job store.
    #[instrument(skip_all, err)]
    pub async fn connect(url: &str, pool_size: u32) -> Result<Self, ConnError> {
        PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
            .map(Self)
            .map_err(ConnError::ConnectionError)
    }

    /// Set up a connection pool without establishing a connection eagerly.
    ///
    /// The first query pays the connection cost. Used where a reachable
    /// database at construction time is not guaranteed (or wanted).
    pub fn connect_lazy(url: &str, pool_size: u32) -> Result<Self, ConnError> {
        PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(url)
            .map(Self)
            .map_err(ConnError::ConnectionError)
    }

    /// Runs migrations on the database.
    ///
    /// SQLx does the right things:
    /// - Locks the DB before running migrations.
    /// - Never runs the same migration twice.
    /// - Errors on changes to old migrations.
    #[instrument(skip(self), err)]
    pub async fn run_migrations(&self) -> Result<(), ConnError> {
        static MIGRATOR: Migrator = sqlx::migrate!();
        MIGRATOR
            .run(&self.0)
            .await
            .map_err(ConnError::MigrationFailed)
    }
}

impl std::ops::Deref for DbConnPool {
    type Target = Pool<Postgres>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
