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

//! Periodic closings.
//!
//! A closing is a fiscal document like any other: it is signed through the
//! [`ChainCoordinator`] and becomes the head of its register's chain. Daily,
//! monthly and yearly closings differ only in their reference and in which
//! entries they aggregate.

use crate::chain::{ChainCoordinator, SignatureOutcome, SigningRequest};
use crate::error::ChainError;
use crate::models::{Amount, DocumentType};
use crate::payload::TaxDetails;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The period a closing summarizes. Dates are UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClosingPeriod {
    Daily(NaiveDate),
    Monthly { year: i32, month: u32 },
    Yearly(i32),
}

impl ClosingPeriod {
    pub fn daily(date: NaiveDate) -> Self {
        ClosingPeriod::Daily(date)
    }

    pub fn monthly(year: i32, month: u32) -> Result<Self, ChainError> {
        if !(1..=12).contains(&month) {
            return Err(ChainError::InvalidRequest(format!(
                "month must be between 1 and 12, got {}",
                month
            )));
        }
        Ok(ClosingPeriod::Monthly { year, month })
    }

    pub fn yearly(year: i32) -> Self {
        ClosingPeriod::Yearly(year)
    }

    /// Document reference signed in place of an invoice number.
    pub fn reference(&self) -> String {
        match self {
            ClosingPeriod::Daily(date) => format!("DAILY-{}", date.format("%Y-%m-%d")),
            ClosingPeriod::Monthly { year, month } => format!("MONTHLY-{:04}-{:02}", year, month),
            ClosingPeriod::Yearly(year) => format!("YEARLY-{:04}", year),
        }
    }

    pub fn document_type(&self) -> DocumentType {
        match self {
            ClosingPeriod::Daily(_) => DocumentType::DailyClosing,
            ClosingPeriod::Monthly { .. } => DocumentType::MonthlyClosing,
            ClosingPeriod::Yearly(_) => DocumentType::YearlyClosing,
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        let date = timestamp.date_naive();
        match *self {
            ClosingPeriod::Daily(day) => date == day,
            ClosingPeriod::Monthly { year, month } => date.year() == year && date.month() == month,
            ClosingPeriod::Yearly(year) => date.year() == year,
        }
    }
}

impl fmt::Display for ClosingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference())
    }
}

/// A document counted by a closing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosingEntry {
    pub amount: Amount,
    pub timestamp: DateTime<Utc>,
    pub tax_details: TaxDetails,
}

impl ClosingEntry {
    pub fn new(amount: Amount, timestamp: DateTime<Utc>) -> Self {
        Self {
            amount,
            timestamp,
            tax_details: TaxDetails::new(),
        }
    }

    pub fn with_tax_details(mut self, tax_details: TaxDetails) -> Self {
        self.tax_details = tax_details;
        self
    }
}

/// Totals signed by a closing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingTotals {
    pub amount: Amount,
    pub transaction_count: u64,
    pub tax_details: TaxDetails,
}

impl ClosingTotals {
    /// Sums the entries that fall inside `period`. Others are ignored.
    ///
    /// Fails with `InvalidRequest` when a sum does not fit an [`Amount`].
    pub fn aggregate<'a>(
        period: &ClosingPeriod,
        entries: impl IntoIterator<Item = &'a ClosingEntry>,
    ) -> Result<Self, ChainError> {
        let overflow =
            || ChainError::InvalidRequest(format!("closing totals for {} overflow", period));

        entries
            .into_iter()
            .filter(|entry| period.contains(entry.timestamp))
            .try_fold(ClosingTotals::default(), |totals, entry| {
                Ok(ClosingTotals {
                    amount: totals.amount.checked_add(entry.amount).ok_or_else(overflow)?,
                    transaction_count: totals.transaction_count + 1,
                    tax_details: totals
                        .tax_details
                        .checked_merge(&entry.tax_details)
                        .ok_or_else(overflow)?,
                })
            })
    }
}

/// Signs closings into a register's chain.
#[derive(Clone)]
pub struct ClosingSigner {
    coordinator: Arc<ChainCoordinator>,
}

impl ClosingSigner {
    pub fn new(coordinator: Arc<ChainCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Signs a closing for `period` carrying `totals`.
    pub async fn sign_closing(
        &self,
        register_id: &str,
        period: &ClosingPeriod,
        totals: &ClosingTotals,
        correlation_id: &str,
    ) -> Result<SignatureOutcome, ChainError> {
        let request = SigningRequest::invoice(register_id, period.reference(), totals.amount)
            .with_document_type(period.document_type())
            .with_transaction_count(totals.transaction_count)
            .with_tax_details(totals.tax_details.clone());

        self.coordinator
            .append_signature(&request, correlation_id)
            .await
    }

    pub async fn sign_daily(
        &self,
        register_id: &str,
        date: NaiveDate,
        entries: &[ClosingEntry],
        correlation_id: &str,
    ) -> Result<SignatureOutcome, ChainError> {
        let period = ClosingPeriod::daily(date);
        let totals = ClosingTotals::aggregate(&period, entries)?;
        self.sign_closing(register_id, &period, &totals, correlation_id)
            .await
    }

    pub async fn sign_monthly(
        &self,
        register_id: &str,
        year: i32,
        month: u32,
        entries: &[ClosingEntry],
        correlation_id: &str,
    ) -> Result<SignatureOutcome, ChainError> {
        let period = ClosingPeriod::monthly(year, month)?;
        let totals = ClosingTotals::aggregate(&period, entries)?;
        self.sign_closing(register_id, &period, &totals, correlation_id)
            .await
    }

    pub async fn sign_yearly(
        &self,
        register_id: &str,
        year: i32,
        entries: &[ClosingEntry],
        correlation_id: &str,
    ) -> Result<SignatureOutcome, ChainError> {
        let period = ClosingPeriod::yearly(year);
        let totals = ClosingTotals::aggregate(&period, entries)?;
        self.sign_closing(register_id, &period, &totals, correlation_id)
            .await
    }

    /// Signs a closing over the invoices already in the register's chain.
    ///
    /// Invoices are assigned to the period by the time they were recorded.
    /// Tax lines are not stored with records, so the closing carries none.
    pub async fn sign_from_ledger(
        &self,
        register_id: &str,
        period: &ClosingPeriod,
        correlation_id: &str,
    ) -> Result<SignatureOutcome, ChainError> {
        let records = self
            .coordinator
            .store()
            .list_chain(register_id)
            .await
            .map_err(|source| ChainError::PersistenceFailure {
                register_id: register_id.to_string(),
                attempts: 1,
                source,
            })?;

        let entries: Vec<ClosingEntry> = records
            .iter()
            .filter(|record| record.document_type == DocumentType::Invoice && record.is_valid)
            .map(|record| ClosingEntry::new(record.amount, record.created_at))
            .collect();

        let totals = ClosingTotals::aggregate(period, &entries)?;
        self.sign_closing(register_id, period, &totals, correlation_id)
            .await
    }
}
