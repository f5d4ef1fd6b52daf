/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Connection pool management.
//!
//! Pools are built with `deadpool-diesel`. Connections are handed to
//! blocking Diesel code through `interact`.

use deadpool_diesel::sqlite::{
    Manager as SqliteManager, Pool as SqlitePool, Runtime as SqliteRuntime,
};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[cfg(feature = "postgres")]
use deadpool_diesel::postgres::{Manager as PgManager, Pool as PgPool, Runtime as PgRuntime};

/// Errors that can occur while setting up or using the database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Unsupported database URL '{0}'")]
    UnsupportedBackend(String),

    #[error("Failed to create connection pool: {0}")]
    PoolCreation(String),

    #[error("Failed to get connection from pool: {0}")]
    Connection(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Database backend, detected from the connection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    #[cfg(feature = "postgres")]
    Postgres,
    Sqlite,
}

impl BackendType {
    /// Detects the backend from a URL.
    ///
    /// `postgres://` and `postgresql://` select PostgreSQL. Everything else
    /// (`sqlite://` URLs, file paths and `:memory:`) selects SQLite.
    pub fn from_url(url: &str) -> Result<Self, DatabaseError> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            #[cfg(feature = "postgres")]
            return Ok(BackendType::Postgres);
            #[cfg(not(feature = "postgres"))]
            return Err(DatabaseError::UnsupportedBackend(format!(
                "{} (built without the postgres feature)",
                url
            )));
        }
        if url.is_empty() {
            return Err(DatabaseError::UnsupportedBackend(url.to_string()));
        }
        Ok(BackendType::Sqlite)
    }
}

/// Backend-specific connection pool.
#[derive(Clone)]
pub enum AnyPool {
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl std::fmt::Debug for AnyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "postgres")]
            AnyPool::Postgres(_) => write!(f, "AnyPool::Postgres(...)"),
            AnyPool::Sqlite(_) => write!(f, "AnyPool::Sqlite(...)"),
        }
    }
}

/// A shared pool of database connections.
///
/// `Database` is `Clone`. Every clone references the same pool.
#[derive(Clone, Debug)]
pub struct Database {
    pool: AnyPool,
    backend: BackendType,
}

/// Default bound on waiting for a pooled connection.
pub const DEFAULT_POOL_TIMEOUT: Duration = Duration::from_secs(5);

impl Database {
    /// Creates a pool for `url` with up to `max_size` connections.
    ///
    /// SQLite pools always use a single connection; concurrent writers on one
    /// file would otherwise fail with "database is locked".
    pub fn new(url: &str, max_size: u32) -> Result<Self, DatabaseError> {
        Self::with_pool_timeout(url, max_size, DEFAULT_POOL_TIMEOUT)
    }

    /// Like [`new`](Self::new), with an explicit bound on checkout waits.
    ///
    /// A checkout that waits longer than `wait_timeout` fails with
    /// [`DatabaseError::Connection`] instead of blocking forever.
    pub fn with_pool_timeout(
        url: &str,
        max_size: u32,
        wait_timeout: Duration,
    ) -> Result<Self, DatabaseError> {
        let backend = BackendType::from_url(url)?;

        match backend {
            #[cfg(feature = "postgres")]
            BackendType::Postgres => {
                let manager = PgManager::new(url, PgRuntime::Tokio1);
                let pool = PgPool::builder(manager)
                    .max_size(max_size.max(1) as usize)
                    .wait_timeout(Some(wait_timeout))
                    .runtime(PgRuntime::Tokio1)
                    .build()
                    .map_err(|e| DatabaseError::PoolCreation(e.to_string()))?;

                info!("PostgreSQL connection pool initialized (size: {})", max_size);

                Ok(Self {
                    pool: AnyPool::Postgres(pool),
                    backend,
                })
            }
            BackendType::Sqlite => {
                let manager = SqliteManager::new(Self::build_sqlite_url(url), SqliteRuntime::Tokio1);
                let sqlite_pool_size = 1;
                let pool = SqlitePool::builder(manager)
                    .max_size(sqlite_pool_size)
                    .wait_timeout(Some(wait_timeout))
                    .runtime(SqliteRuntime::Tokio1)
                    .build()
                    .map_err(|e| DatabaseError::PoolCreation(e.to_string()))?;

                info!(
                    "SQLite connection pool initialized (size: {}, requested: {})",
                    sqlite_pool_size, max_size
                );

                Ok(Self {
                    pool: AnyPool::Sqlite(pool),
                    backend,
                })
            }
        }
    }

    pub fn backend(&self) -> BackendType {
        self.backend
    }

    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    fn build_sqlite_url(url: &str) -> String {
        url.strip_prefix("sqlite://").unwrap_or(url).to_string()
    }

    /// Runs pending migrations for the active backend.
    ///
    /// For SQLite this also enables WAL mode and a 30 second busy timeout.
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        use diesel_migrations::MigrationHarness;

        match &self.pool {
            #[cfg(feature = "postgres")]
            AnyPool::Postgres(pool) => {
                let conn = pool
                    .get()
                    .await
                    .map_err(|e| DatabaseError::Connection(e.to_string()))?;
                conn.interact(|conn| {
                    conn.run_pending_migrations(super::POSTGRES_MIGRATIONS)
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                })
                .await
                .map_err(|e| DatabaseError::Migration(e.to_string()))?
                .map_err(DatabaseError::Migration)?;
            }
            AnyPool::Sqlite(pool) => {
                let conn = pool
                    .get()
                    .await
                    .map_err(|e| DatabaseError::Connection(e.to_string()))?;
                conn.interact(|conn| {
                    use diesel::prelude::*;

                    diesel::sql_query("PRAGMA journal_mode=WAL;")
                        .execute(conn)
                        .map_err(|e| e.to_string())?;
                    diesel::sql_query("PRAGMA busy_timeout=30000;")
                        .execute(conn)
                        .map_err(|e| e.to_string())?;

                    conn.run_pending_migrations(super::SQLITE_MIGRATIONS)
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                })
                .await
                .map_err(|e| DatabaseError::Migration(e.to_string()))?
                .map_err(DatabaseError::Migration)?;
            }
        }

        info!("Database migrations complete");
        Ok(())
    }

    /// Gets a SQLite connection.
    pub async fn get_sqlite_connection(
        &self,
    ) -> Result<deadpool::managed::Object<SqliteManager>, DatabaseError> {
        match &self.pool {
            AnyPool::Sqlite(pool) => pool
                .get()
                .await
                .map_err(|e| DatabaseError::Connection(e.to_string())),
            #[cfg(feature = "postgres")]
            AnyPool::Postgres(_) => Err(DatabaseError::Connection(
                "SQLite connection requested from a PostgreSQL pool".to_string(),
            )),
        }
    }

    /// Gets a PostgreSQL connection.
    #[cfg(feature = "postgres")]
    pub async fn get_postgres_connection(
        &self,
    ) -> Result<deadpool::managed::Object<PgManager>, DatabaseError> {
        match &self.pool {
            AnyPool::Postgres(pool) => pool
                .get()
                .await
                .map_err(|e| DatabaseError::Connection(e.to_string())),
            AnyPool::Sqlite(_) => Err(DatabaseError::Connection(
                "PostgreSQL connection requested from a SQLite pool".to_string(),
            )),
        }
    }
}
