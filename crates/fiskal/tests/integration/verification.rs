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

//! Two-tier verification of issued tokens.

use crate::fixtures::{emulated_keys, fast_config};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use fiskal::keys::KeyMaterialProvider;
use fiskal::signer::verify_token_signature;
use fiskal::store::MemorySignatureStore;
use fiskal::verification::Verification;
use fiskal::{Amount, ChainCoordinator, SigningRequest, Verifier};
use std::sync::Arc;

async fn issue(coordinator: &ChainCoordinator, number: &str) -> String {
    coordinator
        .append_signature(&SigningRequest::invoice("R1", number, Amount::from_cents(4200)), "v")
        .await
        .unwrap()
        .token
        .into_string()
}

#[tokio::test]
async fn test_fresh_token_passes_both_tiers() {
    let keys = emulated_keys();
    let store = Arc::new(MemorySignatureStore::new());
    let coordinator = ChainCoordinator::new(store.clone(), keys.clone(), fast_config());
    let token = issue(&coordinator, "INV-1").await;

    let verifier = Verifier::new(store, keys.clone());
    assert!(matches!(verifier.inspect(&token).await, Verification::Recorded(_)));

    let unrecorded = Verifier::new(Arc::new(MemorySignatureStore::new()), keys.clone());
    assert!(matches!(
        unrecorded.inspect(&token).await,
        Verification::Cryptographic { .. }
    ));
    assert!(verify_token_signature(&token, &keys.public_key().unwrap()));
}

#[tokio::test]
async fn test_single_byte_tamper_is_rejected() {
    let keys = emulated_keys();
    let store = Arc::new(MemorySignatureStore::new());
    let coordinator = ChainCoordinator::new(store.clone(), keys.clone(), fast_config());
    let token = issue(&coordinator, "INV-1").await;
    let verifier = Verifier::new(store, keys);

    let (header, rest) = token.split_once('.').unwrap();
    let (payload, signature) = rest.split_once('.').unwrap();
    let mut bytes = URL_SAFE_NO_PAD.decode(payload).unwrap();

    for index in [0, bytes.len() / 2, bytes.len() - 1] {
        bytes[index] ^= 0x01;
        let tampered = format!("{}.{}.{}", header, URL_SAFE_NO_PAD.encode(&bytes), signature);
        assert!(!verifier.verify(&tampered).await, "tamper at {} accepted", index);
        bytes[index] ^= 0x01;
    }
}

#[tokio::test]
async fn test_ledger_keeps_tokens_valid_across_key_rotation() {
    let store = Arc::new(MemorySignatureStore::new());
    let old_keys = emulated_keys();
    let old_coordinator = ChainCoordinator::new(store.clone(), old_keys, fast_config());
    let old_token = issue(&old_coordinator, "INV-1").await;

    let new_keys = Arc::new(fiskal::keys::SoftwareKeyProvider::emulated("Rotated", 30).unwrap());
    let new_coordinator = ChainCoordinator::new(store.clone(), new_keys.clone(), fast_config());
    let new_token = issue(&new_coordinator, "INV-2").await;

    let verifier = Verifier::new(store, new_keys.clone());
    assert!(verifier.verify(&old_token).await);
    assert!(verifier.verify(&new_token).await);

    // Without the ledger only the current key's tokens verify.
    assert!(matches!(
        verifier.verify_cryptographically(&old_token),
        Verification::Rejected(_)
    ));
    assert!(verifier.verify_cryptographically(&new_token).is_valid());
}

#[tokio::test]
async fn test_invalidated_token_no_longer_verifies() {
    let keys = emulated_keys();
    let store = Arc::new(MemorySignatureStore::new());
    let coordinator = ChainCoordinator::new(store.clone(), keys.clone(), fast_config());
    let token = issue(&coordinator, "INV-1").await;
    let verifier = Verifier::new(store, keys);

    verifier.invalidate(&token, "receipt voided").await.unwrap();
    assert!(!verifier.verify(&token).await);

    // The record still anchors the chain.
    let next = issue(&coordinator, "INV-2").await;
    let payload = fiskal::signer::decode_token(&next).unwrap().payload;
    assert_eq!(payload.previous_signature, token);
}
