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

//! Shared test fixtures.

use async_trait::async_trait;
use fiskal::keys::{KeyError, KeyMaterialProvider, SigningHandle, SoftwareKeyProvider};
use fiskal::models::{NewSignatureRecord, SignatureRecord};
use fiskal::store::{MemorySignatureStore, SignatureStore, StoreError};
use fiskal::{ChainConfig, ChainCoordinator};
use p256::ecdsa::VerifyingKey;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub fn emulated_keys() -> Arc<SoftwareKeyProvider> {
    Arc::new(SoftwareKeyProvider::emulated("Integration Register", 30).unwrap())
}

pub fn fast_config() -> ChainConfig {
    ChainConfig::builder()
        .retry_backoff(Duration::from_millis(1))
        .build()
}

pub fn memory_coordinator() -> (Arc<MemorySignatureStore>, Arc<ChainCoordinator>) {
    let store = Arc::new(MemorySignatureStore::new());
    let coordinator = Arc::new(ChainCoordinator::new(
        store.clone(),
        emulated_keys(),
        fast_config(),
    ));
    (store, coordinator)
}

/// Key provider that can be switched off, like an unplugged signature device.
pub struct SwitchableKeys {
    inner: SoftwareKeyProvider,
    available: AtomicBool,
}

impl SwitchableKeys {
    pub fn new() -> Self {
        Self {
            inner: SoftwareKeyProvider::emulated("Switchable", 30).unwrap(),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), KeyError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(KeyError::Device("signature device not connected".to_string()))
        }
    }
}

impl KeyMaterialProvider for SwitchableKeys {
    fn current_key(&self) -> Result<Arc<dyn SigningHandle>, KeyError> {
        self.check()?;
        self.inner.current_key()
    }

    fn public_key(&self) -> Result<VerifyingKey, KeyError> {
        self.check()?;
        self.inner.public_key()
    }

    fn certificate_bytes(&self) -> Result<Vec<u8>, KeyError> {
        self.inner.certificate_bytes()
    }

    // The serial is cached by the device driver, so it stays readable.
    fn certificate_serial_number(&self) -> Result<String, KeyError> {
        self.inner.certificate_serial_number()
    }

    fn provider_kind(&self) -> &'static str {
        "hardware"
    }
}

/// Store that makes appends for one register slow.
pub struct SlowStore {
    inner: MemorySignatureStore,
    slow_register: String,
    delay: Duration,
}

impl SlowStore {
    pub fn new(slow_register: &str, delay: Duration) -> Self {
        Self {
            inner: MemorySignatureStore::new(),
            slow_register: slow_register.to_string(),
            delay,
        }
    }
}

#[async_trait]
impl SignatureStore for SlowStore {
    async fn chain_head(&self, register_id: &str) -> Result<Option<SignatureRecord>, StoreError> {
        self.inner.chain_head(register_id).await
    }

    async fn append(
        &self,
        record: NewSignatureRecord,
        expected_previous: Option<&str>,
    ) -> Result<SignatureRecord, StoreError> {
        if record.register_id == self.slow_register {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.append(record, expected_previous).await
    }

    async fn find_by_signature(
        &self,
        signature_value: &str,
    ) -> Result<Option<SignatureRecord>, StoreError> {
        self.inner.find_by_signature(signature_value).await
    }

    async fn list_chain(&self, register_id: &str) -> Result<Vec<SignatureRecord>, StoreError> {
        self.inner.list_chain(register_id).await
    }

    async fn mark_invalid(&self, id: Uuid, reason: &str) -> Result<SignatureRecord, StoreError> {
        self.inner.mark_invalid(id, reason).await
    }

    async fn count(&self, register_id: &str) -> Result<u64, StoreError> {
        self.inner.count(register_id).await
    }
}
