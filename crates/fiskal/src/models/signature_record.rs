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

//! Domain models for signature records.
//!
//! A signature record is the unit of truth in a register's chain. Apart from
//! the validity flag and validation error, every field is written once.

use super::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of fiscal document covered by a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Invoice,
    DailyClosing,
    MonthlyClosing,
    YearlyClosing,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::DailyClosing => "daily_closing",
            DocumentType::MonthlyClosing => "monthly_closing",
            DocumentType::YearlyClosing => "yearly_closing",
        }
    }

    pub fn is_closing(&self) -> bool {
        !matches!(self, DocumentType::Invoice)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invoice" => Ok(DocumentType::Invoice),
            "daily_closing" => Ok(DocumentType::DailyClosing),
            "monthly_closing" => Ok(DocumentType::MonthlyClosing),
            "yearly_closing" => Ok(DocumentType::YearlyClosing),
            other => Err(format!("Unknown document type: {}", other)),
        }
    }
}

/// A persisted link of a register's signature chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub id: Uuid,
    /// The compact signed token
    pub signature_value: String,
    pub register_id: String,
    /// Invoice number or closing-period identifier
    pub document_reference: String,
    pub document_type: DocumentType,
    pub amount: Amount,
    pub certificate_serial_number: String,
    /// 1-based position within the register's chain
    pub chain_position: i64,
    pub created_at: DateTime<Utc>,
    pub is_valid: bool,
    pub validation_error: Option<String>,
}

/// Model for appending a new record to a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSignatureRecord {
    pub id: Uuid,
    pub signature_value: String,
    pub register_id: String,
    pub document_reference: String,
    pub document_type: DocumentType,
    pub amount: Amount,
    pub certificate_serial_number: String,
    pub chain_position: i64,
    pub created_at: DateTime<Utc>,
}

impl NewSignatureRecord {
    /// Materializes the stored form. New records are always valid.
    pub fn into_record(self) -> SignatureRecord {
        SignatureRecord {
            id: self.id,
            signature_value: self.signature_value,
            register_id: self.register_id,
            document_reference: self.document_reference,
            document_type: self.document_type,
            amount: self.amount,
            certificate_serial_number: self.certificate_serial_number,
            chain_position: self.chain_position,
            created_at: self.created_at,
            is_valid: true,
            validation_error: None,
        }
    }
}
