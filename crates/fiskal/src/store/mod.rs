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

//! Persistence boundary of the signature chain.
//!
//! The coordinator only needs a handful of operations from storage: read the
//! chain head, append a new head, and look records up for verification.
//! Storage technology is an implementation detail behind [`SignatureStore`].

mod db;
mod memory;

pub use db::DbSignatureStore;
pub use memory::MemorySignatureStore;

use crate::database::DatabaseError;
use crate::models::{NewSignatureRecord, SignatureRecord};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in a signature store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The chain head moved between reading it and appending.
    #[error(
        "Chain head of register '{register_id}' moved: expected position {expected_position}, found {found_position}"
    )]
    Conflict {
        register_id: String,
        expected_position: i64,
        found_position: i64,
    },

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorInformation as _, DatabaseErrorKind, Error};

        match e {
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Duplicate(info.message().to_string())
            }
            Error::NotFound => StoreError::NotFound("record".to_string()),
            other => StoreError::Database(other.to_string()),
        }
    }
}

impl From<DatabaseError> for StoreError {
    fn from(e: DatabaseError) -> Self {
        StoreError::ConnectionPool(e.to_string())
    }
}

/// Storage operations required by the signature chain.
///
/// Implementations must be thread-safe (`Send + Sync`). Apart from
/// [`mark_invalid`](Self::mark_invalid), no operation modifies a stored
/// record.
#[async_trait]
pub trait SignatureStore: Send + Sync {
    /// The most recent record of `register_id`, if any.
    async fn chain_head(&self, register_id: &str) -> Result<Option<SignatureRecord>, StoreError>;

    /// Appends `record` as the new chain head.
    ///
    /// `expected_previous` is the signature value of the head the record was
    /// built on (`None` for the first record). Fails with
    /// [`StoreError::Conflict`] if the head is no longer that record or the
    /// record's position does not directly follow it.
    async fn append(
        &self,
        record: NewSignatureRecord,
        expected_previous: Option<&str>,
    ) -> Result<SignatureRecord, StoreError>;

    async fn find_by_signature(
        &self,
        signature_value: &str,
    ) -> Result<Option<SignatureRecord>, StoreError>;

    /// All records of `register_id`, ordered by chain position.
    async fn list_chain(&self, register_id: &str) -> Result<Vec<SignatureRecord>, StoreError>;

    /// Flags a record as invalid. The only permitted update to a record.
    async fn mark_invalid(&self, id: Uuid, reason: &str) -> Result<SignatureRecord, StoreError>;

    async fn count(&self, register_id: &str) -> Result<u64, StoreError>;
}

/// Checks that `record` may follow `head`.
pub(crate) fn check_successor(
    record: &NewSignatureRecord,
    head: Option<(&str, i64)>,
    expected_previous: Option<&str>,
) -> Result<(), StoreError> {
    let (head_signature, head_position) = match head {
        Some((signature, position)) => (Some(signature), position),
        None => (None, 0),
    };

    if head_signature != expected_previous || record.chain_position != head_position + 1 {
        return Err(StoreError::Conflict {
            register_id: record.register_id.clone(),
            expected_position: record.chain_position - 1,
            found_position: head_position,
        });
    }
    Ok(())
}
