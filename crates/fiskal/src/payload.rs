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

//! Canonical fiscal payload.
//!
//! The payload is the exact structure that gets signed. It is serialized with
//! RFC 8785 JSON canonicalization (sorted keys, no insignificant whitespace),
//! money is rendered as a string with exactly two fractional digits and tax
//! lines are keyed by their rate. Identical inputs always produce
//! byte-identical output.
//!
//! Changing any of these rules invalidates every token issued before the
//! change.

use crate::models::{Amount, DocumentType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur while encoding or decoding a payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One tax line of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxLine {
    /// Rate in basis points, `2000` = 20.00 %
    pub rate_basis_points: u32,
    pub net: Amount,
    pub tax: Amount,
}

impl TaxLine {
    pub fn new(rate_basis_points: u32, net: Amount, tax: Amount) -> Self {
        Self {
            rate_basis_points,
            net,
            tax,
        }
    }

    pub fn gross(&self) -> Amount {
        self.net + self.tax
    }

    /// Whether net plus tax fits an [`Amount`].
    pub fn gross_in_range(&self) -> bool {
        self.net.checked_add(self.tax).is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct TaxTotals {
    net: Amount,
    tax: Amount,
}

/// Tax breakdown of a document, summed per rate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxDetails {
    rates: BTreeMap<u32, TaxTotals>,
}

impl TaxDetails {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a line. Lines with the same rate are summed.
    pub fn add_line(&mut self, line: TaxLine) {
        let totals = self.rates.entry(line.rate_basis_points).or_default();
        totals.net += line.net;
        totals.tax += line.tax;
    }

    pub fn with_line(mut self, line: TaxLine) -> Self {
        self.add_line(line);
        self
    }

    pub fn merge(&mut self, other: &TaxDetails) {
        for line in other.lines() {
            self.add_line(line);
        }
    }

    /// Like [`merge`](Self::merge), but returns `None` instead of saturating.
    ///
    /// Every summed rate must also keep a gross that fits an [`Amount`].
    pub fn checked_merge(&self, other: &TaxDetails) -> Option<TaxDetails> {
        let mut merged = self.clone();
        for line in other.lines() {
            let totals = merged.rates.entry(line.rate_basis_points).or_default();
            totals.net = totals.net.checked_add(line.net)?;
            totals.tax = totals.tax.checked_add(line.tax)?;
            totals.net.checked_add(totals.tax)?;
        }
        Some(merged)
    }

    pub fn lines(&self) -> impl Iterator<Item = TaxLine> + '_ {
        self.rates
            .iter()
            .map(|(rate, totals)| TaxLine::new(*rate, totals.net, totals.tax))
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn total_gross(&self) -> Amount {
        self.lines().map(|line| line.gross()).sum()
    }

    fn to_canonical(&self) -> BTreeMap<String, TaxEntry> {
        self.lines()
            .map(|line| {
                (
                    format_rate(line.rate_basis_points),
                    TaxEntry {
                        gross: line.gross(),
                        net: line.net,
                        tax: line.tax,
                    },
                )
            })
            .collect()
    }
}

fn format_rate(basis_points: u32) -> String {
    format!("{}.{:02}", basis_points / 100, basis_points % 100)
}

/// Signed form of one tax rate's totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxEntry {
    pub gross: Amount,
    pub net: Amount,
    pub tax: Amount,
}

/// The fixed-field structure that is signed for every fiscal document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPayload {
    pub register_id: String,
    pub document_number: String,
    pub document_type: DocumentType,
    /// `YYYY-MM-DD`, UTC
    pub date: String,
    /// `HH:MM:SS`, UTC
    pub time: String,
    pub amount: Amount,
    /// Empty for the first record of a register, never omitted
    pub previous_signature: String,
    pub certificate_serial: String,
    pub tax_details: BTreeMap<String, TaxEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_count: Option<u64>,
}

impl CanonicalPayload {
    pub fn with_document_type(mut self, document_type: DocumentType) -> Self {
        self.document_type = document_type;
        self
    }

    pub fn with_certificate_serial(mut self, serial: impl Into<String>) -> Self {
        self.certificate_serial = serial.into();
        self
    }

    pub fn with_transaction_count(mut self, count: u64) -> Self {
        self.transaction_count = Some(count);
        self
    }

    /// Deterministic byte encoding of the payload.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, PayloadError> {
        Ok(serde_jcs::to_vec(self)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, PayloadError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Builds the canonical payload for an invoice.
///
/// Closings adjust the document type and transaction count through the
/// `with_*` methods. The certificate serial is filled in by the coordinator.
pub fn build_payload(
    register_id: &str,
    document_number: &str,
    amount: Amount,
    timestamp: DateTime<Utc>,
    previous_signature: &str,
    tax_details: &TaxDetails,
) -> CanonicalPayload {
    CanonicalPayload {
        register_id: register_id.to_string(),
        document_number: document_number.to_string(),
        document_type: DocumentType::Invoice,
        date: timestamp.format("%Y-%m-%d").to_string(),
        time: timestamp.format("%H:%M:%S").to_string(),
        amount,
        previous_signature: previous_signature.to_string(),
        certificate_serial: String::new(),
        tax_details: tax_details.to_canonical(),
        transaction_count: None,
    }
}
