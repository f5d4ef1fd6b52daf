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

//! Errors surfaced by the signing path.
//!
//! A signing operation either returns a token or one of these errors. There
//! is no third outcome: a fiscal document whose signing failed must not be
//! treated as issued.

use crate::certificate::CertificateParseError;
use crate::keys::KeyError;
use crate::payload::PayloadError;
use crate::store::StoreError;
use thiserror::Error;

/// Typed failure of a chain operation.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The signing key could not be used. Never retried automatically.
    #[error("Signing key unavailable: {0}")]
    KeyUnavailable(#[from] KeyError),

    /// The register's extension right was not acquired within the bounded wait.
    #[error("Chain for register '{register_id}' is busy (waited {waited_ms} ms)")]
    ChainBusy { register_id: String, waited_ms: u64 },

    #[error("Certificate could not be parsed: {0}")]
    CertificateParseError(#[from] CertificateParseError),

    /// Reading the chain head or appending the new record failed on every attempt.
    #[error(
        "Persistence failure for register '{register_id}' after {attempts} attempt(s): {source}"
    )]
    PersistenceFailure {
        register_id: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// A required inbound field was missing or empty.
    #[error("Invalid signing request: {0}")]
    InvalidRequest(String),

    #[error("Payload encoding failed: {0}")]
    Encoding(#[from] PayloadError),
}

impl ChainError {
    /// Whether the caller may retry the operation with backoff.
    ///
    /// Only contention and persistence failures are transient. Key and
    /// certificate problems indicate misconfiguration.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChainError::ChainBusy { .. } | ChainError::PersistenceFailure { .. }
        )
    }

    /// Stable short name of the error kind, used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ChainError::KeyUnavailable(_) => "key_unavailable",
            ChainError::ChainBusy { .. } => "chain_busy",
            ChainError::CertificateParseError(_) => "certificate_parse_error",
            ChainError::PersistenceFailure { .. } => "persistence_failure",
            ChainError::InvalidRequest(_) => "invalid_request",
            ChainError::Encoding(_) => "encoding",
        }
    }
}
