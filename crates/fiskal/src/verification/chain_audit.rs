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

//! Offline audit of a stored chain.

use super::VerificationError;
use crate::audit;
use crate::keys::KeyMaterialProvider;
use crate::models::SignatureRecord;
use crate::signer::decode_token;
use crate::store::SignatureStore;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// A defect found in a register's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainViolation {
    #[error("record {position}: token cannot be decoded ({reason})")]
    UndecodableToken { position: i64, reason: String },

    #[error("record {position}: does not link to the record before it")]
    BrokenLink {
        position: i64,
        expected_previous: String,
        found_previous: String,
    },

    #[error("records {positions:?} share one predecessor")]
    ForkedPredecessor {
        predecessor: String,
        positions: Vec<i64>,
    },

    #[error("record {position}: signature does not match the current key")]
    BadSignature { position: i64 },

    #[error("record {position}: payload names register '{found}'")]
    RegisterMismatch { position: i64, found: String },

    #[error("expected position {expected}, found {found}")]
    PositionGap { expected: i64, found: i64 },
}

impl ChainViolation {
    /// Chain position the violation is reported at.
    pub fn position(&self) -> i64 {
        match self {
            ChainViolation::UndecodableToken { position, .. }
            | ChainViolation::BrokenLink { position, .. }
            | ChainViolation::BadSignature { position }
            | ChainViolation::RegisterMismatch { position, .. } => *position,
            ChainViolation::ForkedPredecessor { positions, .. } => {
                positions.last().copied().unwrap_or_default()
            }
            ChainViolation::PositionGap { found, .. } => *found,
        }
    }
}

/// Result of auditing one register.
#[derive(Debug, Clone, Serialize)]
pub struct ChainAuditReport {
    pub register_id: String,
    pub records_checked: usize,
    /// Records marked invalid. They remain chain links and are checked like any other.
    pub invalidated: usize,
    pub violations: Vec<ChainViolation>,
}

impl ChainAuditReport {
    pub fn is_intact(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Walks a register's stored chain and checks it link by link.
pub struct ChainAudit {
    store: Arc<dyn SignatureStore>,
    keys: Arc<dyn KeyMaterialProvider>,
}

impl ChainAudit {
    pub fn new(store: Arc<dyn SignatureStore>, keys: Arc<dyn KeyMaterialProvider>) -> Self {
        Self { store, keys }
    }

    /// Audits `register_id`.
    ///
    /// With `verify_signatures` every token is also checked against the
    /// current public key. Chains signed across a key rotation will then
    /// report the older records as `BadSignature`.
    pub async fn audit(
        &self,
        register_id: &str,
        verify_signatures: bool,
    ) -> Result<ChainAuditReport, VerificationError> {
        let records = self.store.list_chain(register_id).await?;
        let public_key = if verify_signatures {
            Some(self.keys.public_key()?)
        } else {
            None
        };

        let mut violations = Vec::new();
        let mut successors: BTreeMap<String, Vec<i64>> = BTreeMap::new();
        let mut previous = String::new();

        for (index, record) in records.iter().enumerate() {
            let expected_position = index as i64 + 1;
            if record.chain_position != expected_position {
                violations.push(ChainViolation::PositionGap {
                    expected: expected_position,
                    found: record.chain_position,
                });
            }
            let position = record.chain_position;

            match decode_token(&record.signature_value) {
                Ok(decoded) => {
                    if decoded.payload.register_id != register_id {
                        violations.push(ChainViolation::RegisterMismatch {
                            position,
                            found: decoded.payload.register_id.clone(),
                        });
                    }
                    if decoded.payload.previous_signature != previous {
                        violations.push(ChainViolation::BrokenLink {
                            position,
                            expected_previous: previous.clone(),
                            found_previous: decoded.payload.previous_signature.clone(),
                        });
                    }
                    if let Some(key) = &public_key {
                        if !decoded.verify(key) {
                            violations.push(ChainViolation::BadSignature { position });
                        }
                    }
                    successors
                        .entry(decoded.payload.previous_signature)
                        .or_default()
                        .push(position);
                }
                Err(e) => violations.push(ChainViolation::UndecodableToken {
                    position,
                    reason: e.to_string(),
                }),
            }

            previous = record.signature_value.clone();
        }

        for (predecessor, positions) in successors {
            if positions.len() > 1 {
                violations.push(ChainViolation::ForkedPredecessor {
                    predecessor,
                    positions,
                });
            }
        }

        for violation in &violations {
            audit::log_chain_audit_violation(register_id, violation.position(), &violation.to_string());
        }

        Ok(ChainAuditReport {
            register_id: register_id.to_string(),
            records_checked: records.len(),
            invalidated: records.iter().filter(|record| !record.is_valid).count(),
            violations,
        })
    }
}

/// Orders records by their previous-signature links, ignoring stored
/// positions and timestamps.
///
/// Starts from the record linking to `""` and follows successors. Fails with
/// the first violation found if the records do not form one linear chain.
pub fn order_by_link(records: &[SignatureRecord]) -> Result<Vec<SignatureRecord>, ChainViolation> {
    let mut by_previous: HashMap<String, &SignatureRecord> = HashMap::with_capacity(records.len());

    for record in records {
        let decoded = decode_token(&record.signature_value).map_err(|e| {
            ChainViolation::UndecodableToken {
                position: record.chain_position,
                reason: e.to_string(),
            }
        })?;
        if let Some(existing) = by_previous.insert(decoded.payload.previous_signature.clone(), record) {
            return Err(ChainViolation::ForkedPredecessor {
                predecessor: decoded.payload.previous_signature,
                positions: vec![existing.chain_position, record.chain_position],
            });
        }
    }

    let mut ordered = Vec::with_capacity(records.len());
    let mut previous = String::new();
    while let Some(record) = by_previous.remove(&previous) {
        previous = record.signature_value.clone();
        ordered.push(record.clone());
    }

    if let Some(orphan) = by_previous.into_values().min_by_key(|record| record.chain_position) {
        return Err(ChainViolation::BrokenLink {
            position: orphan.chain_position,
            expected_previous: previous,
            found_previous: decode_token(&orphan.signature_value)
                .map(|decoded| decoded.payload.previous_signature)
                .unwrap_or_default(),
        });
    }

    Ok(ordered)
}
