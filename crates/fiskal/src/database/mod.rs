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

//! Database access for the signature ledger.
//!
//! SQLite is always available. PostgreSQL is enabled with the `postgres`
//! feature. The backend is chosen at runtime from the connection URL.

pub mod connection;
pub mod models;
pub mod schema;

pub use connection::{AnyPool, BackendType, Database, DatabaseError, DEFAULT_POOL_TIMEOUT};

use diesel_migrations::{embed_migrations, EmbeddedMigrations};

/// Embedded SQLite migrations.
pub const SQLITE_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");

/// Embedded PostgreSQL migrations.
#[cfg(feature = "postgres")]
pub const POSTGRES_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/postgres");

/// Evaluates the expression matching the database backend.
///
/// The PostgreSQL arm is compiled only with the `postgres` feature.
#[macro_export]
macro_rules! dispatch_backend {
    ($backend:expr, $postgres:expr, $sqlite:expr) => {
        match $backend {
            #[cfg(feature = "postgres")]
            $crate::database::BackendType::Postgres => $postgres,
            $crate::database::BackendType::Sqlite => $sqlite,
        }
    };
}
