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

//! Diesel-backed signature store.
//!
//! The append runs in a single transaction that re-reads the chain head,
//! checks it against the expected predecessor and inserts the new record.
//! On SQLite the transaction is `BEGIN IMMEDIATE`, which takes the write
//! lock up front. On PostgreSQL the head row is read with `FOR UPDATE`.
//! In both cases the unique `(register_id, chain_position)` index rejects a
//! second record at the same position, so two processes sharing one
//! database cannot fork a chain.

use super::{check_successor, SignatureStore, StoreError};
use crate::database::models::DbSignatureRecord;
use crate::database::schema::signature_records;
use crate::database::Database;
use crate::models::{NewSignatureRecord, SignatureRecord};
use async_trait::async_trait;
use diesel::prelude::*;
use uuid::Uuid;

/// Runs a Diesel closure on a pooled connection of the active backend.
///
/// The body is compiled once per backend.
macro_rules! with_connection {
    ($database:expr, |$conn:ident| $body:expr) => {
        $crate::dispatch_backend!(
            $database.backend(),
            {
                let conn = $database.get_postgres_connection().await?;
                conn.interact(move |$conn| $body)
                    .await
                    .map_err(|e| StoreError::ConnectionPool(e.to_string()))?
            },
            {
                let conn = $database.get_sqlite_connection().await?;
                conn.interact(move |$conn| $body)
                    .await
                    .map_err(|e| StoreError::ConnectionPool(e.to_string()))?
            }
        )
    };
}

/// A [`SignatureStore`] persisting records through Diesel.
#[derive(Clone, Debug)]
pub struct DbSignatureStore {
    database: Database,
}

impl DbSignatureStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    #[cfg(feature = "postgres")]
    async fn append_postgres(
        &self,
        row: DbSignatureRecord,
        record: NewSignatureRecord,
        expected_previous: Option<String>,
    ) -> Result<(), StoreError> {
        use diesel::connection::Connection;

        let conn = self.database.get_postgres_connection().await?;
        conn.interact(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let head: Option<(String, i64)> = signature_records::table
                    .filter(signature_records::register_id.eq(&row.register_id))
                    .order(signature_records::chain_position.desc())
                    .select((
                        signature_records::signature_value,
                        signature_records::chain_position,
                    ))
                    .for_update()
                    .first(conn)
                    .optional()?;

                check_successor(
                    &record,
                    head.as_ref().map(|(s, p)| (s.as_str(), *p)),
                    expected_previous.as_deref(),
                )?;

                diesel::insert_into(signature_records::table)
                    .values(&row)
                    .execute(conn)?;
                Ok(())
            })
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))?
    }

    async fn append_sqlite(
        &self,
        row: DbSignatureRecord,
        record: NewSignatureRecord,
        expected_previous: Option<String>,
    ) -> Result<(), StoreError> {
        let conn = self.database.get_sqlite_connection().await?;
        conn.interact(move |conn| {
            conn.immediate_transaction::<_, StoreError, _>(|conn| {
                let head: Option<(String, i64)> = signature_records::table
                    .filter(signature_records::register_id.eq(&row.register_id))
                    .order(signature_records::chain_position.desc())
                    .select((
                        signature_records::signature_value,
                        signature_records::chain_position,
                    ))
                    .first(conn)
                    .optional()?;

                check_successor(
                    &record,
                    head.as_ref().map(|(s, p)| (s.as_str(), *p)),
                    expected_previous.as_deref(),
                )?;

                diesel::insert_into(signature_records::table)
                    .values(&row)
                    .execute(conn)?;
                Ok(())
            })
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))?
    }
}

fn into_records(rows: Vec<DbSignatureRecord>) -> Result<Vec<SignatureRecord>, StoreError> {
    rows.into_iter().map(SignatureRecord::try_from).collect()
}

#[async_trait]
impl SignatureStore for DbSignatureStore {
    async fn chain_head(&self, register_id: &str) -> Result<Option<SignatureRecord>, StoreError> {
        let register_id = register_id.to_string();
        let row: Option<DbSignatureRecord> = with_connection!(self.database, |conn| {
            signature_records::table
                .filter(signature_records::register_id.eq(&register_id))
                .order(signature_records::chain_position.desc())
                .select(DbSignatureRecord::as_select())
                .first(conn)
                .optional()
        })?;
        row.map(SignatureRecord::try_from).transpose()
    }

    async fn append(
        &self,
        record: NewSignatureRecord,
        expected_previous: Option<&str>,
    ) -> Result<SignatureRecord, StoreError> {
        let row = DbSignatureRecord::from(&record);
        let expected_previous = expected_previous.map(str::to_string);

        crate::dispatch_backend!(
            self.database.backend(),
            self.append_postgres(row, record.clone(), expected_previous)
                .await,
            self.append_sqlite(row, record.clone(), expected_previous)
                .await
        )?;

        Ok(record.into_record())
    }

    async fn find_by_signature(
        &self,
        signature_value: &str,
    ) -> Result<Option<SignatureRecord>, StoreError> {
        let signature_value = signature_value.to_string();
        let row: Option<DbSignatureRecord> = with_connection!(self.database, |conn| {
            signature_records::table
                .filter(signature_records::signature_value.eq(&signature_value))
                .select(DbSignatureRecord::as_select())
                .first(conn)
                .optional()
        })?;
        row.map(SignatureRecord::try_from).transpose()
    }

    async fn list_chain(&self, register_id: &str) -> Result<Vec<SignatureRecord>, StoreError> {
        let register_id = register_id.to_string();
        let rows: Vec<DbSignatureRecord> = with_connection!(self.database, |conn| {
            signature_records::table
                .filter(signature_records::register_id.eq(&register_id))
                .order(signature_records::chain_position.asc())
                .select(DbSignatureRecord::as_select())
                .load(conn)
        })?;
        into_records(rows)
    }

    async fn mark_invalid(&self, id: Uuid, reason: &str) -> Result<SignatureRecord, StoreError> {
        let key = id.to_string();
        let reason = reason.to_string();
        let row: Option<DbSignatureRecord> = with_connection!(self.database, |conn| {
            let updated = diesel::update(signature_records::table.find(&key))
                .set((
                    signature_records::is_valid.eq(false),
                    signature_records::validation_error.eq(Some(reason.clone())),
                ))
                .execute(conn)?;
            if updated == 0 {
                return Ok(None);
            }
            signature_records::table
                .find(&key)
                .select(DbSignatureRecord::as_select())
                .first(conn)
                .optional()
        })?;

        row.map(SignatureRecord::try_from)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn count(&self, register_id: &str) -> Result<u64, StoreError> {
        let register_id = register_id.to_string();
        let count: i64 = with_connection!(self.database, |conn| {
            signature_records::table
                .filter(signature_records::register_id.eq(&register_id))
                .count()
                .get_result(conn)
        })?;
        Ok(count.max(0) as u64)
    }
}
