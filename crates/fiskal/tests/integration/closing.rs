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

//! Closings as chain links.

use crate::fixtures::memory_coordinator;
use chrono::{Datelike, NaiveDate, Utc};
use fiskal::closing::ClosingEntry;
use fiskal::signer::decode_token;
use fiskal::store::SignatureStore;
use fiskal::verification::ChainAudit;
use fiskal::{Amount, ClosingPeriod, ClosingSigner, ClosingTotals, DocumentType, SigningRequest};

#[tokio::test]
async fn test_daily_closing_participates_in_chain() {
    let (store, coordinator) = memory_coordinator();
    let closings = ClosingSigner::new(coordinator.clone());

    coordinator
        .append_signature(&SigningRequest::invoice("R1", "INV-1", Amount::from_cents(500)), "i1")
        .await
        .unwrap();
    let second = coordinator
        .append_signature(&SigningRequest::invoice("R1", "INV-2", Amount::from_cents(700)), "i2")
        .await
        .unwrap();

    let today = Utc::now().date_naive();
    let closing = closings
        .sign_from_ledger("R1", &ClosingPeriod::daily(today), "close")
        .await
        .unwrap();
    assert_eq!(closing.previous_signature_used, second.token.as_str());

    let next = coordinator
        .append_signature(&SigningRequest::invoice("R1", "INV-3", Amount::from_cents(100)), "i3")
        .await
        .unwrap();
    assert_eq!(next.previous_signature_used, closing.token.as_str());

    let closing_record = store
        .find_by_signature(closing.token.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(closing_record.document_type, DocumentType::DailyClosing);
    assert_eq!(closing_record.document_reference, ClosingPeriod::daily(today).reference());

    let report = ChainAudit::new(store.clone(), coordinator.keys().clone())
        .audit("R1", true)
        .await
        .unwrap();
    assert!(report.is_intact());
    assert_eq!(report.records_checked, 4);
}

#[tokio::test]
async fn test_closing_levels_share_one_mechanism() {
    let (_store, coordinator) = memory_coordinator();
    let closings = ClosingSigner::new(coordinator);

    let now = Utc::now();
    let entries = vec![
        ClosingEntry::new(Amount::from_cents(1000), now),
        ClosingEntry::new(Amount::from_cents(2500), now),
    ];

    let daily = closings
        .sign_daily("R1", now.date_naive(), &entries, "d")
        .await
        .unwrap();
    let monthly = closings
        .sign_monthly("R1", now.year(), now.month(), &entries, "m")
        .await
        .unwrap();
    let yearly = closings.sign_yearly("R1", now.year(), &entries, "y").await.unwrap();

    assert_eq!(monthly.previous_signature_used, daily.token.as_str());
    assert_eq!(yearly.previous_signature_used, monthly.token.as_str());

    for (outcome, document_type) in [
        (&daily, DocumentType::DailyClosing),
        (&monthly, DocumentType::MonthlyClosing),
        (&yearly, DocumentType::YearlyClosing),
    ] {
        let payload = decode_token(outcome.token.as_str()).unwrap().payload;
        assert_eq!(payload.document_type, document_type);
        assert_eq!(payload.amount, Amount::from_cents(3500));
        assert_eq!(payload.transaction_count, Some(2));
    }
}

#[tokio::test]
async fn test_explicit_totals_are_signed_as_given() {
    let (_store, coordinator) = memory_coordinator();
    let closings = ClosingSigner::new(coordinator);

    let period = ClosingPeriod::daily(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap());
    let totals = ClosingTotals {
        amount: Amount::from_cents(-250),
        transaction_count: 0,
        ..ClosingTotals::default()
    };
    let outcome = closings.sign_closing("R1", &period, &totals, "c").await.unwrap();

    let payload = decode_token(outcome.token.as_str()).unwrap().payload;
    assert_eq!(payload.document_number, "DAILY-2026-03-31");
    assert_eq!(payload.amount.to_canonical_string(), "-2.50");
    assert_eq!(payload.transaction_count, Some(0));
}
