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

//! In-process signature store.

use super::{check_successor, SignatureStore, StoreError};
use crate::models::{NewSignatureRecord, SignatureRecord};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use uuid::Uuid;

#[derive(Default)]
struct Ledger {
    /// Records per register, in chain order
    chains: HashMap<String, Vec<SignatureRecord>>,
    /// Signature value to (register, index)
    by_signature: HashMap<String, (String, usize)>,
}

/// A [`SignatureStore`] keeping records in memory.
///
/// Suitable for tests and single-process deployments that persist the ledger
/// elsewhere. Faults can be injected to exercise retry paths.
#[derive(Default)]
pub struct MemorySignatureStore {
    ledger: RwLock<Ledger>,
    failing_appends: AtomicU32,
    failing_reads: AtomicU32,
}

impl MemorySignatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` calls to `append` fail with [`StoreError::Unavailable`].
    pub fn fail_next_appends(&self, n: u32) {
        self.failing_appends.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` calls to `chain_head` fail with [`StoreError::Unavailable`].
    pub fn fail_next_reads(&self, n: u32) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    /// Total number of records across all registers.
    pub fn len(&self) -> usize {
        self.ledger.read().by_signature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_fault(counter: &AtomicU32, operation: &str) -> Result<(), StoreError> {
        let injected = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            Err(StoreError::Unavailable(format!("injected {} failure", operation)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SignatureStore for MemorySignatureStore {
    async fn chain_head(&self, register_id: &str) -> Result<Option<SignatureRecord>, StoreError> {
        Self::take_fault(&self.failing_reads, "read")?;
        Ok(self
            .ledger
            .read()
            .chains
            .get(register_id)
            .and_then(|chain| chain.last().cloned()))
    }

    async fn append(
        &self,
        record: NewSignatureRecord,
        expected_previous: Option<&str>,
    ) -> Result<SignatureRecord, StoreError> {
        Self::take_fault(&self.failing_appends, "append")?;

        let mut ledger = self.ledger.write();
        if ledger.by_signature.contains_key(&record.signature_value) {
            return Err(StoreError::Duplicate(format!(
                "signature already recorded for register '{}'",
                record.register_id
            )));
        }

        let head = ledger
            .chains
            .get(&record.register_id)
            .and_then(|chain| chain.last())
            .map(|head| (head.signature_value.as_str(), head.chain_position));
        check_successor(&record, head, expected_previous)?;

        let stored = record.into_record();
        let chain = ledger.chains.entry(stored.register_id.clone()).or_default();
        chain.push(stored.clone());
        let index = chain.len() - 1;
        ledger.by_signature.insert(
            stored.signature_value.clone(),
            (stored.register_id.clone(), index),
        );

        Ok(stored)
    }

    async fn find_by_signature(
        &self,
        signature_value: &str,
    ) -> Result<Option<SignatureRecord>, StoreError> {
        let ledger = self.ledger.read();
        Ok(ledger
            .by_signature
            .get(signature_value)
            .and_then(|(register, index)| ledger.chains.get(register)?.get(*index))
            .cloned())
    }

    async fn list_chain(&self, register_id: &str) -> Result<Vec<SignatureRecord>, StoreError> {
        Ok(self
            .ledger
            .read()
            .chains
            .get(register_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_invalid(&self, id: Uuid, reason: &str) -> Result<SignatureRecord, StoreError> {
        let mut ledger = self.ledger.write();
        let record = ledger
            .chains
            .values_mut()
            .flat_map(|chain| chain.iter_mut())
            .find(|record| record.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        record.is_valid = false;
        record.validation_error = Some(reason.to_string());
        Ok(record.clone())
    }

    async fn count(&self, register_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .ledger
            .read()
            .chains
            .get(register_id)
            .map_or(0, |chain| chain.len() as u64))
    }
}
