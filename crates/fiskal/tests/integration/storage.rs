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

//! The coordinator on a SQLite ledger.

use crate::fixtures::{emulated_keys, fast_config};
use diesel::prelude::*;
use fiskal::database::schema::signature_records;
use fiskal::database::Database;
use fiskal::store::{DbSignatureStore, SignatureStore, StoreError};
use fiskal::verification::{order_by_link, ChainAudit};
use fiskal::{Amount, ChainCoordinator, ChainError, SigningRequest, Verifier};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

async fn sqlite_store() -> (tempfile::TempDir, Arc<DbSignatureStore>) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("ledger.db").display());
    let database = Database::new(&url, 4).unwrap();
    database.run_migrations().await.unwrap();
    (dir, Arc::new(DbSignatureStore::new(database)))
}

#[tokio::test]
async fn test_sqlite_chain_round_trip() {
    let (_dir, store) = sqlite_store().await;
    let keys = emulated_keys();
    let coordinator = ChainCoordinator::new(store.clone(), keys.clone(), fast_config());

    let first = coordinator
        .append_signature(&SigningRequest::invoice("R1", "INV-1", Amount::from_cents(990)), "s1")
        .await
        .unwrap();
    let second = coordinator
        .append_signature(&SigningRequest::invoice("R1", "INV-2", Amount::from_cents(-990)), "s2")
        .await
        .unwrap();
    assert_eq!(second.previous_signature_used, first.token.as_str());

    let head = store.chain_head("R1").await.unwrap().unwrap();
    assert_eq!(head.signature_value, second.token.as_str());
    assert_eq!(head.amount, Amount::from_cents(-990));
    assert_eq!(head.created_at, second.created_at);

    let verifier = Verifier::new(store.clone(), keys.clone());
    assert!(verifier.verify(first.token.as_str()).await);

    let report = ChainAudit::new(store, keys).audit("R1", true).await.unwrap();
    assert!(report.is_intact(), "{:?}", report.violations);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_concurrent_appends_do_not_fork() {
    let (_dir, store) = sqlite_store().await;
    let coordinator = Arc::new(ChainCoordinator::new(store.clone(), emulated_keys(), fast_config()));

    let handles: Vec<_> = (0..12)
        .map(|i| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                let register = if i % 2 == 0 { "R1" } else { "R2" };
                let request = SigningRequest::invoice(register, format!("INV-{}", i), Amount::ZERO);
                coordinator.append_signature(&request, "sqlite").await
            })
        })
        .collect();
    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    for register in ["R1", "R2"] {
        let chain = store.list_chain(register).await.unwrap();
        assert_eq!(chain.len(), 6);
        assert_eq!(order_by_link(&chain).unwrap(), chain);
    }
}

#[tokio::test]
async fn test_sqlite_signed_fields_are_write_once() {
    let (_dir, store) = sqlite_store().await;
    let coordinator = ChainCoordinator::new(store.clone(), emulated_keys(), fast_config());
    let outcome = coordinator
        .append_signature(&SigningRequest::invoice("R1", "INV-1", Amount::from_cents(100)), "w")
        .await
        .unwrap();

    let conn = store.database().get_sqlite_connection().await.unwrap();
    let rewrite = conn
        .interact(|conn| {
            diesel::update(signature_records::table)
                .set(signature_records::amount_cents.eq(1))
                .execute(conn)
        })
        .await
        .unwrap();
    assert!(rewrite.is_err());
    drop(conn);

    let record = store
        .find_by_signature(outcome.token.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.amount, Amount::from_cents(100));
}

#[tokio::test]
async fn test_sqlite_ledger_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("ledger.db").display());
    let keys = emulated_keys();

    let token = {
        let database = Database::new(&url, 1).unwrap();
        database.run_migrations().await.unwrap();
        let coordinator =
            ChainCoordinator::new(Arc::new(DbSignatureStore::new(database)), keys.clone(), fast_config());
        coordinator
            .append_signature(&SigningRequest::invoice("R1", "INV-1", Amount::ZERO), "open")
            .await
            .unwrap()
            .token
    };

    let database = Database::new(&url, 1).unwrap();
    database.run_migrations().await.unwrap();
    let store = Arc::new(DbSignatureStore::new(database));
    let coordinator = ChainCoordinator::new(store.clone(), keys, fast_config());
    let next = coordinator
        .append_signature(&SigningRequest::invoice("R1", "INV-2", Amount::ZERO), "reopen")
        .await
        .unwrap();

    assert_eq!(next.previous_signature_used, token.as_str());
    assert_eq!(next.chain_position, 2);
}

#[tokio::test]
async fn test_exhausted_pool_fails_instead_of_hanging() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("ledger.db").display());
    let database = Database::with_pool_timeout(&url, 1, Duration::from_millis(50)).unwrap();
    database.run_migrations().await.unwrap();
    let store = Arc::new(DbSignatureStore::new(database));
    let coordinator = ChainCoordinator::new(store.clone(), emulated_keys(), fast_config());

    let held = store.database().get_sqlite_connection().await.unwrap();

    let head = tokio::time::timeout(Duration::from_secs(5), store.chain_head("R1"))
        .await
        .expect("chain head read should not hang");
    assert!(matches!(head, Err(StoreError::ConnectionPool(_))));

    let request = SigningRequest::invoice("R1", "INV-1", Amount::from_cents(100));
    let appended = tokio::time::timeout(
        Duration::from_secs(5),
        coordinator.append_signature(&request, "pool"),
    )
    .await
    .expect("append should not hang");
    match appended {
        Err(ChainError::PersistenceFailure { source, .. }) => {
            assert!(matches!(source, StoreError::ConnectionPool(_)))
        }
        other => panic!("expected PersistenceFailure, got {:?}", other),
    }

    drop(held);
    assert!(coordinator.append_signature(&request, "pool").await.is_ok());
}
