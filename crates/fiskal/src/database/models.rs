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

//! Row models for the signature ledger.
//!
//! Rows use backend-neutral column types. Conversion to and from the domain
//! [`SignatureRecord`] happens here, at the storage boundary.

use super::schema::signature_records;
use crate::models::{Amount, NewSignatureRecord, SignatureRecord};
use crate::store::StoreError;
use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use uuid::Uuid;

/// A row of the `signature_records` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = signature_records)]
pub struct DbSignatureRecord {
    pub id: String,
    pub signature_value: String,
    pub register_id: String,
    pub document_reference: String,
    pub document_type: String,
    pub amount_cents: i64,
    pub certificate_serial_number: String,
    pub chain_position: i64,
    /// RFC 3339 with microsecond precision, `Z` suffix
    pub created_at: String,
    pub is_valid: bool,
    pub validation_error: Option<String>,
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl From<&NewSignatureRecord> for DbSignatureRecord {
    fn from(record: &NewSignatureRecord) -> Self {
        Self {
            id: record.id.to_string(),
            signature_value: record.signature_value.clone(),
            register_id: record.register_id.clone(),
            document_reference: record.document_reference.clone(),
            document_type: record.document_type.as_str().to_string(),
            amount_cents: record.amount.cents(),
            certificate_serial_number: record.certificate_serial_number.clone(),
            chain_position: record.chain_position,
            created_at: format_timestamp(&record.created_at),
            is_valid: true,
            validation_error: None,
        }
    }
}

impl TryFrom<DbSignatureRecord> for SignatureRecord {
    type Error = StoreError;

    fn try_from(row: DbSignatureRecord) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: row.id.clone(),
            reason,
        };

        let id = Uuid::parse_str(&row.id).map_err(|e| corrupt(format!("invalid id: {}", e)))?;
        let document_type = row.document_type.parse().map_err(corrupt)?;
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| corrupt(format!("invalid created_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(SignatureRecord {
            id,
            signature_value: row.signature_value,
            register_id: row.register_id,
            document_reference: row.document_reference,
            document_type,
            amount: Amount::from_cents(row.amount_cents),
            certificate_serial_number: row.certificate_serial_number,
            chain_position: row.chain_position,
            created_at,
            is_valid: row.is_valid,
            validation_error: row.validation_error,
        })
    }
}
