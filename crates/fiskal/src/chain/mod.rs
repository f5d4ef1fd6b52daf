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

//! # Chain Coordinator
//!
//! Serializes chain extension per register. An append runs entirely inside
//! the register's extension right:
//!
//! 1. read the chain head (empty previous signature for a new register)
//! 2. build the canonical payload on top of it
//! 3. sign it
//! 4. compare-and-append the new record
//!
//! If reading or appending fails, the signed token is dropped and the whole
//! read-sign-append sequence starts over from a fresh head read. After
//! [`ChainConfig::max_persist_attempts`] failures the operation fails with
//! [`ChainError::PersistenceFailure`] and nothing is returned to the caller.
//!
//! Rights are scoped to a single register. Signing for register A never
//! waits on register B.

mod config;
mod locks;

pub use config::{ChainConfig, ChainConfigBuilder};
pub use locks::{RegisterGuard, RegisterLocks, RegisterState};

use crate::audit;
use crate::certificate::{self, CertificateInfo, CertificateStatus};
use crate::error::ChainError;
use crate::keys::KeyMaterialProvider;
use crate::models::{Amount, DocumentType, NewSignatureRecord};
use crate::payload::{build_payload, TaxDetails, TaxLine};
use crate::signer::{CompactToken, FiscalSigner};
use crate::store::{SignatureStore, StoreError};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// A fiscal document to be signed into a register's chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    pub register_id: String,
    /// Invoice number, or the period reference of a closing
    pub document_number: String,
    pub document_type: DocumentType,
    pub amount: Amount,
    /// Business time of the document. Defaults to the time of signing.
    pub timestamp: Option<DateTime<Utc>>,
    pub tax_details: TaxDetails,
    /// Number of documents summarized by a closing
    pub transaction_count: Option<u64>,
}

impl SigningRequest {
    pub fn invoice(
        register_id: impl Into<String>,
        document_number: impl Into<String>,
        amount: Amount,
    ) -> Self {
        Self {
            register_id: register_id.into(),
            document_number: document_number.into(),
            document_type: DocumentType::Invoice,
            amount,
            timestamp: None,
            tax_details: TaxDetails::new(),
            transaction_count: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_tax_details(mut self, tax_details: TaxDetails) -> Self {
        self.tax_details = tax_details;
        self
    }

    pub fn with_tax_line(mut self, line: TaxLine) -> Self {
        self.tax_details.add_line(line);
        self
    }

    pub fn with_document_type(mut self, document_type: DocumentType) -> Self {
        self.document_type = document_type;
        self
    }

    pub fn with_transaction_count(mut self, count: u64) -> Self {
        self.transaction_count = Some(count);
        self
    }

    /// Checks presence of the required fields. Business correctness of the
    /// values is the caller's concern.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.register_id.trim().is_empty() {
            return Err(ChainError::InvalidRequest(
                "register id must not be empty".to_string(),
            ));
        }
        if self.document_number.trim().is_empty() {
            return Err(ChainError::InvalidRequest(
                "document number must not be empty".to_string(),
            ));
        }
        if self.transaction_count.is_some() && !self.document_type.is_closing() {
            return Err(ChainError::InvalidRequest(
                "transaction count is only allowed on closings".to_string(),
            ));
        }
        if !self.tax_details.lines().all(|line| line.gross_in_range()) {
            return Err(ChainError::InvalidRequest(
                "tax line gross is out of range".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of a successful append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureOutcome {
    pub token: CompactToken,
    /// The predecessor the token actually links to (`""` for the first record)
    pub previous_signature_used: String,
    pub chain_position: i64,
    pub record_id: Uuid,
    pub certificate_serial_number: String,
    pub created_at: DateTime<Utc>,
}

/// Why a single read-sign-append attempt failed.
enum AttemptError {
    /// Storage failed. The attempt may be repeated from a fresh head read.
    Store(StoreError),
    Fatal(ChainError),
}

/// Appends signatures to per-register chains.
pub struct ChainCoordinator {
    store: Arc<dyn SignatureStore>,
    keys: Arc<dyn KeyMaterialProvider>,
    signer: FiscalSigner,
    locks: RegisterLocks,
    config: ChainConfig,
}

impl ChainCoordinator {
    pub fn new(
        store: Arc<dyn SignatureStore>,
        keys: Arc<dyn KeyMaterialProvider>,
        config: ChainConfig,
    ) -> Self {
        Self {
            signer: FiscalSigner::new(keys.clone()),
            store,
            keys,
            locks: RegisterLocks::new(),
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn SignatureStore> {
        &self.store
    }

    pub fn keys(&self) -> &Arc<dyn KeyMaterialProvider> {
        &self.keys
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Whether a signing operation currently holds `register_id`'s extension right.
    pub fn register_state(&self, register_id: &str) -> RegisterState {
        self.locks.state(register_id)
    }

    /// Parsed information about the signing certificate.
    pub fn certificate_info(&self) -> Result<CertificateInfo, ChainError> {
        let bytes = self.keys.certificate_bytes()?;
        Ok(certificate::parse_certificate(&bytes)?)
    }

    /// Status of the signing certificate.
    ///
    /// A certificate that cannot be read is reported as `Unknown`. Signing is
    /// not affected.
    pub fn certificate_status(&self) -> CertificateStatus {
        match self.certificate_info() {
            Ok(info) => info.status_at(Utc::now()),
            Err(e) => {
                let reason = e.to_string();
                audit::log_certificate_degraded(&reason);
                CertificateStatus::Unknown(reason)
            }
        }
    }

    /// Signs `request` as the new head of its register's chain.
    ///
    /// Waits at most [`ChainConfig::lock_timeout`] for the register's
    /// extension right and fails with `ChainBusy` otherwise. The token is
    /// only returned once its record is persisted.
    #[instrument(
        name = "append_signature",
        skip(self, request, correlation_id),
        fields(register_id = %request.register_id, correlation_id = %correlation_id)
    )]
    pub async fn append_signature(
        &self,
        request: &SigningRequest,
        correlation_id: &str,
    ) -> Result<SignatureOutcome, ChainError> {
        request.validate()?;
        let register_id = request.register_id.as_str();

        let _guard = match self
            .locks
            .acquire(register_id, self.config.lock_timeout())
            .await
        {
            Ok(guard) => {
                audit::record_lock_wait(guard.waited());
                guard
            }
            Err(waited) => {
                audit::log_chain_busy(correlation_id, register_id, waited);
                return Err(ChainError::ChainBusy {
                    register_id: register_id.to_string(),
                    waited_ms: waited.as_millis() as u64,
                });
            }
        };

        let certificate_serial = self
            .keys
            .certificate_serial_number()
            .map_err(|e| self.key_unavailable(e.into(), correlation_id, register_id))?;
        let timestamp = request
            .timestamp
            .unwrap_or_else(Utc::now)
            .trunc_subsecs(6);

        let max_attempts = self.config.max_persist_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .try_append(request, &certificate_serial, timestamp, correlation_id)
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Store(e)) if attempt >= max_attempts => {
                    audit::log_signature_discarded(
                        correlation_id,
                        register_id,
                        attempt,
                        &e.to_string(),
                    );
                    return Err(ChainError::PersistenceFailure {
                        register_id: register_id.to_string(),
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(AttemptError::Store(e)) => {
                    audit::log_persist_retry(correlation_id, register_id, attempt, &e.to_string());
                    tokio::time::sleep(self.config.retry_backoff() * attempt).await;
                }
            }
        }
    }

    /// One read-sign-append pass. Must be called with the register's right held.
    async fn try_append(
        &self,
        request: &SigningRequest,
        certificate_serial: &str,
        timestamp: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<SignatureOutcome, AttemptError> {
        let register_id = request.register_id.as_str();

        let head = self
            .store
            .chain_head(register_id)
            .await
            .map_err(AttemptError::Store)?;
        let (previous_signature, chain_position) = match head {
            Some(head) => (head.signature_value, head.chain_position + 1),
            None => (String::new(), 1),
        };

        let mut payload = build_payload(
            register_id,
            &request.document_number,
            request.amount,
            timestamp,
            &previous_signature,
            &request.tax_details,
        )
        .with_document_type(request.document_type)
        .with_certificate_serial(certificate_serial);
        if let Some(count) = request.transaction_count {
            payload = payload.with_transaction_count(count);
        }

        let token = self
            .signer
            .sign(&payload, correlation_id)
            .map_err(|e| AttemptError::Fatal(self.key_unavailable(e, correlation_id, register_id)))?;

        let record = NewSignatureRecord {
            id: Uuid::new_v4(),
            signature_value: token.as_str().to_string(),
            register_id: register_id.to_string(),
            document_reference: request.document_number.clone(),
            document_type: request.document_type,
            amount: request.amount,
            certificate_serial_number: certificate_serial.to_string(),
            chain_position,
            created_at: Utc::now().trunc_subsecs(6),
        };
        let expected_previous = (!previous_signature.is_empty()).then_some(previous_signature.as_str());

        let stored = self
            .store
            .append(record, expected_previous)
            .await
            .map_err(AttemptError::Store)?;

        audit::log_signature_created(
            correlation_id,
            register_id,
            &stored.document_reference,
            stored.document_type,
            stored.chain_position,
            certificate_serial,
        );
        debug!(chain_position = stored.chain_position, "Chain head advanced");

        Ok(SignatureOutcome {
            token,
            previous_signature_used: previous_signature,
            chain_position: stored.chain_position,
            record_id: stored.id,
            certificate_serial_number: stored.certificate_serial_number,
            created_at: stored.created_at,
        })
    }

    /// Audits key failures on the way out. Other errors pass through untouched.
    fn key_unavailable(&self, error: ChainError, correlation_id: &str, register_id: &str) -> ChainError {
        if let ChainError::KeyUnavailable(ref key_error) = error {
            audit::log_key_unavailable(
                correlation_id,
                register_id,
                self.keys.provider_kind(),
                &key_error.to_string(),
            );
        }
        error
    }
}
