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

//! Concurrent appends: no forks within a register, no waiting across registers.

use crate::fixtures::{emulated_keys, fast_config, memory_coordinator, SlowStore};
use fiskal::chain::RegisterState;
use fiskal::signer::decode_token;
use fiskal::store::SignatureStore;
use fiskal::verification::order_by_link;
use fiskal::{Amount, ChainConfig, ChainCoordinator, ChainError, SigningRequest};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_form_one_chain() {
    let (store, coordinator) = memory_coordinator();
    const TASKS: usize = 25;

    let handles: Vec<_> = (0..TASKS)
        .map(|i| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                let request = SigningRequest::invoice("R1", format!("INV-{}", i), Amount::from_cents(i as i64));
                coordinator
                    .append_signature(&request, &format!("task-{}", i))
                    .await
            })
        })
        .collect();

    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    let records = store.list_chain("R1").await.unwrap();
    assert_eq!(records.len(), TASKS);

    // Every predecessor is used by at most one record.
    let mut uses: HashMap<String, usize> = HashMap::new();
    for record in &records {
        let previous = decode_token(&record.signature_value).unwrap().payload.previous_signature;
        *uses.entry(previous).or_default() += 1;
    }
    assert!(uses.values().all(|count| *count == 1), "fork detected: {:?}", uses);

    assert_eq!(order_by_link(&records).unwrap().len(), TASKS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_register_does_not_block_others() {
    let store = Arc::new(SlowStore::new("SLOW", Duration::from_millis(500)));
    let coordinator = Arc::new(ChainCoordinator::new(store.clone(), emulated_keys(), fast_config()));

    let slow = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            let request = SigningRequest::invoice("SLOW", "INV-1", Amount::ZERO);
            coordinator.append_signature(&request, "slow").await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(coordinator.register_state("SLOW"), RegisterState::Signing);

    let started = Instant::now();
    let request = SigningRequest::invoice("FAST", "INV-1", Amount::ZERO);
    coordinator.append_signature(&request, "fast").await.unwrap();
    assert!(
        started.elapsed() < Duration::from_millis(250),
        "fast register waited {:?}",
        started.elapsed()
    );
    assert_eq!(coordinator.register_state("FAST"), RegisterState::Idle);

    slow.await.unwrap().unwrap();
    assert_eq!(store.count("SLOW").await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bounded_wait_reports_busy_without_partial_record() {
    let store = Arc::new(SlowStore::new("R1", Duration::from_millis(300)));
    let config = ChainConfig::builder()
        .lock_timeout(Duration::from_millis(50))
        .build();
    let coordinator = Arc::new(ChainCoordinator::new(store.clone(), emulated_keys(), config));

    let first = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            let request = SigningRequest::invoice("R1", "INV-1", Amount::ZERO);
            coordinator.append_signature(&request, "first").await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let request = SigningRequest::invoice("R1", "INV-2", Amount::ZERO);
    match coordinator.append_signature(&request, "second").await {
        Err(ChainError::ChainBusy { register_id, waited_ms }) => {
            assert_eq!(register_id, "R1");
            assert!(waited_ms >= 50);
        }
        other => panic!("expected ChainBusy, got {:?}", other),
    }

    first.await.unwrap().unwrap();
    let chain = store.list_chain("R1").await.unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].document_reference, "INV-1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_waiters_are_served_once_the_right_frees() {
    let store = Arc::new(SlowStore::new("R1", Duration::from_millis(20)));
    let coordinator = Arc::new(ChainCoordinator::new(store.clone(), emulated_keys(), fast_config()));

    let results = join_all((0..5).map(|i| {
        let coordinator = coordinator.clone();
        async move {
            let request = SigningRequest::invoice("R1", format!("INV-{}", i), Amount::ZERO);
            coordinator.append_signature(&request, "queued").await
        }
    }))
    .await;

    assert!(results.iter().all(Result::is_ok));
    let positions: Vec<i64> = store
        .list_chain("R1")
        .await
        .unwrap()
        .iter()
        .map(|r| r.chain_position)
        .collect();
    assert_eq!(positions, vec![1, 2, 3, 4, 5]);
}
