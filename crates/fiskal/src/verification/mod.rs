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

//! Token verification.
//!
//! Verification is two-tier:
//!
//! - **record**: a token found in the ledger is trusted on record. This is
//!   the only way to accept tokens signed with a key that has since been
//!   rotated out. A record marked invalid fails verification.
//! - **cryptographic**: a token with no record is checked against the
//!   provider's current public key.
//!
//! Verification never fails with an error. Anything that is not a valid
//! signature is simply `false`.

mod chain_audit;

pub use chain_audit::{order_by_link, ChainAudit, ChainAuditReport, ChainViolation};

use crate::audit;
use crate::keys::{KeyError, KeyMaterialProvider};
use crate::models::SignatureRecord;
use crate::signer::decode_token;
use crate::store::{SignatureStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Errors that can occur in operations that inspect the ledger.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Outcome of verifying one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Found in the ledger and valid
    Recorded(SignatureRecord),
    /// Found in the ledger but marked invalid
    Invalidated(SignatureRecord),
    /// No record; the signature checks out against the current key
    Cryptographic { register_id: String },
    Rejected(String),
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(
            self,
            Verification::Recorded(_) | Verification::Cryptographic { .. }
        )
    }

    /// Name of the tier that decided, for diagnostics.
    pub fn tier(&self) -> &'static str {
        match self {
            Verification::Recorded(_) | Verification::Invalidated(_) => "record",
            Verification::Cryptographic { .. } => "cryptographic",
            Verification::Rejected(_) => "none",
        }
    }
}

/// Verifies tokens against the ledger and the current key.
#[derive(Clone)]
pub struct Verifier {
    store: Arc<dyn SignatureStore>,
    keys: Arc<dyn KeyMaterialProvider>,
}

impl Verifier {
    pub fn new(store: Arc<dyn SignatureStore>, keys: Arc<dyn KeyMaterialProvider>) -> Self {
        Self { store, keys }
    }

    /// Whether `token` is a valid fiscal signature.
    pub async fn verify(&self, token: &str) -> bool {
        self.inspect(token).await.is_valid()
    }

    /// Verifies `token` and reports which tier decided.
    pub async fn inspect(&self, token: &str) -> Verification {
        let outcome = match self.store.find_by_signature(token).await {
            Ok(Some(record)) if record.is_valid => Verification::Recorded(record),
            Ok(Some(record)) => Verification::Invalidated(record),
            Ok(None) => self.verify_cryptographically(token),
            Err(e) => {
                warn!("Ledger lookup failed, falling back to key verification: {}", e);
                self.verify_cryptographically(token)
            }
        };

        match &outcome {
            Verification::Recorded(record) => {
                audit::log_verification_success(&record.register_id, outcome.tier())
            }
            Verification::Cryptographic { register_id } => {
                audit::log_verification_success(register_id, outcome.tier())
            }
            Verification::Invalidated(record) => audit::log_verification_failure(
                Some(&record.register_id),
                record
                    .validation_error
                    .as_deref()
                    .unwrap_or("record marked invalid"),
            ),
            Verification::Rejected(reason) => audit::log_verification_failure(None, reason),
        }

        outcome
    }

    /// Checks `token` against the current public key only, ignoring the ledger.
    pub fn verify_cryptographically(&self, token: &str) -> Verification {
        let decoded = match decode_token(token) {
            Ok(decoded) => decoded,
            Err(e) => return Verification::Rejected(e.to_string()),
        };
        let public_key = match self.keys.public_key() {
            Ok(key) => key,
            Err(e) => return Verification::Rejected(format!("public key unavailable: {}", e)),
        };

        if decoded.verify(&public_key) {
            Verification::Cryptographic {
                register_id: decoded.payload.register_id,
            }
        } else {
            Verification::Rejected("signature does not match the current key".to_string())
        }
    }

    /// Marks the record holding `signature_value` invalid.
    ///
    /// The record stays in its chain. Later verifications of the token fail.
    pub async fn invalidate(
        &self,
        signature_value: &str,
        reason: &str,
    ) -> Result<SignatureRecord, StoreError> {
        let record = self
            .store
            .find_by_signature(signature_value)
            .await?
            .ok_or_else(|| StoreError::NotFound("no record for signature".to_string()))?;

        let updated = self.store.mark_invalid(record.id, reason).await?;
        audit::log_signature_invalidated(&updated.register_id, &updated.document_reference, reason);
        Ok(updated)
    }
}
