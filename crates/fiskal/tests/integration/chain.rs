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

//! Chain linkage through the coordinator.

use crate::fixtures::memory_coordinator;
use chrono::{TimeZone, Utc};
use fiskal::payload::{TaxDetails, TaxLine};
use fiskal::signer::decode_token;
use fiskal::store::SignatureStore;
use fiskal::verification::order_by_link;
use fiskal::{Amount, SigningRequest};

#[tokio::test]
async fn test_first_signature_has_empty_predecessor() {
    let (_store, coordinator) = memory_coordinator();

    let request = SigningRequest::invoice("R1", "2026-000001", Amount::from_cents(1990));
    let outcome = coordinator.append_signature(&request, "req-1").await.unwrap();

    assert_eq!(outcome.previous_signature_used, "");
    let payload = decode_token(outcome.token.as_str()).unwrap().payload;
    assert_eq!(payload.previous_signature, "");
    assert_eq!(payload.register_id, "R1");
    assert_eq!(payload.document_number, "2026-000001");
}

#[tokio::test]
async fn test_second_signature_links_to_first() {
    let (_store, coordinator) = memory_coordinator();

    let first = coordinator
        .append_signature(&SigningRequest::invoice("R1", "1", Amount::from_cents(100)), "a")
        .await
        .unwrap();
    let second = coordinator
        .append_signature(&SigningRequest::invoice("R1", "2", Amount::from_cents(200)), "b")
        .await
        .unwrap();

    assert_eq!(second.previous_signature_used, first.token.as_str());
    let payload = decode_token(second.token.as_str()).unwrap().payload;
    assert_eq!(payload.previous_signature, first.token.as_str());
    assert_eq!(second.chain_position, 2);
}

#[tokio::test]
async fn test_sequential_chain_reconstructs_by_link() {
    let (store, coordinator) = memory_coordinator();

    let mut tokens = Vec::new();
    for i in 0..10 {
        let request = SigningRequest::invoice("R1", format!("INV-{}", i), Amount::from_cents(i));
        tokens.push(coordinator.append_signature(&request, "seq").await.unwrap().token);
    }

    let mut records = store.list_chain("R1").await.unwrap();
    records.reverse();
    let ordered = order_by_link(&records).unwrap();

    let ordered_tokens: Vec<&str> = ordered.iter().map(|r| r.signature_value.as_str()).collect();
    let expected: Vec<&str> = tokens.iter().map(|t| t.as_str()).collect();
    assert_eq!(ordered_tokens, expected);
}

#[tokio::test]
async fn test_outcome_matches_stored_record() {
    let (store, coordinator) = memory_coordinator();

    let request = SigningRequest::invoice("R1", "INV-1", Amount::from_cents(1200))
        .with_timestamp(Utc.with_ymd_and_hms(2026, 5, 4, 12, 30, 0).unwrap())
        .with_tax_details(TaxDetails::new().with_line(TaxLine::new(
            2000,
            Amount::from_cents(1000),
            Amount::from_cents(200),
        )));
    let outcome = coordinator.append_signature(&request, "req").await.unwrap();

    let record = store
        .find_by_signature(outcome.token.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.id, outcome.record_id);
    assert_eq!(record.chain_position, outcome.chain_position);
    assert_eq!(record.certificate_serial_number, outcome.certificate_serial_number);
    assert_eq!(record.amount, Amount::from_cents(1200));
    assert!(record.is_valid);

    let payload = decode_token(outcome.token.as_str()).unwrap().payload;
    assert_eq!(payload.certificate_serial, outcome.certificate_serial_number);
    assert_eq!(payload.date, "2026-05-04");
    assert_eq!(payload.tax_details["20.00"].gross, Amount::from_cents(1200));
}

#[tokio::test]
async fn test_registers_have_independent_chains() {
    let (store, coordinator) = memory_coordinator();

    for register in ["R1", "R2"] {
        for i in 0..3 {
            let request = SigningRequest::invoice(register, format!("{}-{}", register, i), Amount::ZERO);
            coordinator.append_signature(&request, "multi").await.unwrap();
        }
    }

    for register in ["R1", "R2"] {
        let chain = store.list_chain(register).await.unwrap();
        assert_eq!(chain.len(), 3);
        let first = decode_token(&chain[0].signature_value).unwrap().payload;
        assert_eq!(first.previous_signature, "");
        assert!(order_by_link(&chain).is_ok());
    }
}
