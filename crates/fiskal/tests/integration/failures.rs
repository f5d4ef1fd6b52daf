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

//! Failure paths: nothing is issued unless it is signed and persisted.

use crate::fixtures::{fast_config, memory_coordinator, SwitchableKeys};
use fiskal::keys::KeyError;
use fiskal::store::{MemorySignatureStore, SignatureStore, StoreError};
use fiskal::{Amount, ChainCoordinator, ChainError, SigningRequest};
use std::sync::Arc;
use tracing_test::traced_test;

#[tokio::test]
#[traced_test]
async fn test_key_unavailable_persists_nothing() {
    let store = Arc::new(MemorySignatureStore::new());
    let keys = Arc::new(SwitchableKeys::new());
    let coordinator = ChainCoordinator::new(store.clone(), keys.clone(), fast_config());
    keys.set_available(false);

    let request = SigningRequest::invoice("R1", "INV-1", Amount::from_cents(100));
    let result = coordinator.append_signature(&request, "no-key").await;

    assert!(matches!(
        result,
        Err(ChainError::KeyUnavailable(KeyError::Device(_)))
    ));
    assert!(!result.as_ref().unwrap_err().is_retryable());
    assert!(store.is_empty());
    assert!(logs_contain("key.unavailable"));
}

#[tokio::test]
async fn test_key_recovers_without_gap() {
    let store = Arc::new(MemorySignatureStore::new());
    let keys = Arc::new(SwitchableKeys::new());
    let coordinator = ChainCoordinator::new(store.clone(), keys.clone(), fast_config());

    let first = coordinator
        .append_signature(&SigningRequest::invoice("R1", "INV-1", Amount::ZERO), "a")
        .await
        .unwrap();

    keys.set_available(false);
    assert!(coordinator
        .append_signature(&SigningRequest::invoice("R1", "INV-2", Amount::ZERO), "b")
        .await
        .is_err());

    keys.set_available(true);
    let second = coordinator
        .append_signature(&SigningRequest::invoice("R1", "INV-2", Amount::ZERO), "c")
        .await
        .unwrap();
    assert_eq!(second.previous_signature_used, first.token.as_str());
    assert_eq!(second.chain_position, 2);
}

#[tokio::test]
#[traced_test]
async fn test_failed_persist_is_retried_from_fresh_head() {
    let (store, coordinator) = memory_coordinator();
    coordinator
        .append_signature(&SigningRequest::invoice("R1", "INV-1", Amount::ZERO), "a")
        .await
        .unwrap();

    store.fail_next_appends(2);
    let outcome = coordinator
        .append_signature(&SigningRequest::invoice("R1", "INV-2", Amount::ZERO), "retry")
        .await
        .unwrap();

    assert_eq!(outcome.chain_position, 2);
    assert_eq!(store.count("R1").await.unwrap(), 2);
    assert!(logs_contain("signature.persist_retry"));

    // The returned token is the one that was persisted.
    let head = store.chain_head("R1").await.unwrap().unwrap();
    assert_eq!(head.signature_value, outcome.token.as_str());
}

#[tokio::test]
async fn test_persistent_failure_surfaces_after_bounded_retries() {
    let (store, coordinator) = memory_coordinator();
    store.fail_next_appends(10);

    let result = coordinator
        .append_signature(&SigningRequest::invoice("R1", "INV-1", Amount::ZERO), "down")
        .await;

    match result {
        Err(ChainError::PersistenceFailure {
            register_id,
            attempts,
            source: StoreError::Unavailable(_),
        }) => {
            assert_eq!(register_id, "R1");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected PersistenceFailure, got {:?}", other),
    }
    assert!(store.is_empty());

    store.fail_next_appends(0);
    assert!(coordinator
        .append_signature(&SigningRequest::invoice("R1", "INV-1", Amount::ZERO), "up")
        .await
        .is_ok());
}

#[tokio::test]
async fn test_missing_register_is_invalid_request() {
    let (store, coordinator) = memory_coordinator();
    let result = coordinator
        .append_signature(&SigningRequest::invoice("", "INV-1", Amount::ZERO), "bad")
        .await;
    assert!(matches!(result, Err(ChainError::InvalidRequest(_))));
    assert!(store.is_empty());
}
