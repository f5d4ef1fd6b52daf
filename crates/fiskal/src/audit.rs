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

//! Audit logging for the signature chain.
//!
//! Every security-relevant step of the chain emits a structured `tracing`
//! event with a stable `event_type` field, so log pipelines can alert on
//! chain contention, key outages and verification failures. Counters and
//! histograms are recorded through the `metrics` facade alongside; without
//! an installed recorder they are no-ops.

use crate::models::DocumentType;
use std::time::Duration;

/// Event types for chain operations.
pub mod events {
    /// A signature was created and persisted as the new chain head.
    pub const SIGNATURE_CREATED: &str = "signature.created";
    /// Persisting a signature failed and the operation restarts from the head read.
    pub const SIGNATURE_PERSIST_RETRY: &str = "signature.persist_retry";
    /// A signed token was discarded after persistence failed on every attempt.
    pub const SIGNATURE_DISCARDED: &str = "signature.discarded";
    /// A record was marked invalid.
    pub const SIGNATURE_INVALIDATED: &str = "signature.invalidated";

    /// The extension right for a register was not acquired in time.
    pub const CHAIN_BUSY: &str = "chain.busy";
    /// A chain audit found a violation.
    pub const CHAIN_AUDIT_VIOLATION: &str = "chain.audit.violation";

    /// The key material provider could not supply a key.
    pub const KEY_UNAVAILABLE: &str = "key.unavailable";
    /// Certificate information could not be derived.
    pub const CERTIFICATE_DEGRADED: &str = "certificate.degraded";

    /// Verification success event type.
    pub const VERIFICATION_SUCCESS: &str = "verification.success";
    /// Verification failure event type.
    pub const VERIFICATION_FAILURE: &str = "verification.failure";
}

/// Metric names.
pub mod metric_names {
    pub const SIGNATURES_TOTAL: &str = "fiskal_signatures_total";
    pub const CHAIN_BUSY_TOTAL: &str = "fiskal_chain_busy_total";
    pub const PERSIST_RETRIES_TOTAL: &str = "fiskal_persist_retries_total";
    pub const VERIFICATIONS_TOTAL: &str = "fiskal_verifications_total";
    pub const LOCK_WAIT_SECONDS: &str = "fiskal_lock_wait_seconds";
}

/// Log a persisted signature.
pub fn log_signature_created(
    correlation_id: &str,
    register_id: &str,
    document_reference: &str,
    document_type: DocumentType,
    chain_position: i64,
    certificate_serial: &str,
) {
    tracing::info!(
        event_type = events::SIGNATURE_CREATED,
        correlation_id = %correlation_id,
        register_id = %register_id,
        document_reference = %document_reference,
        document_type = %document_type,
        chain_position = chain_position,
        certificate_serial = %certificate_serial,
        "Signature appended to chain"
    );
    metrics::counter!(metric_names::SIGNATURES_TOTAL, "document_type" => document_type.as_str())
        .increment(1);
}

/// Log a failed persistence attempt that will be retried.
pub fn log_persist_retry(correlation_id: &str, register_id: &str, attempt: u32, error: &str) {
    tracing::warn!(
        event_type = events::SIGNATURE_PERSIST_RETRY,
        correlation_id = %correlation_id,
        register_id = %register_id,
        attempt = attempt,
        error = %error,
        "Persisting signature failed, retrying from chain head"
    );
    metrics::counter!(metric_names::PERSIST_RETRIES_TOTAL).increment(1);
}

/// Log that a signed token was thrown away because it could not be persisted.
pub fn log_signature_discarded(correlation_id: &str, register_id: &str, attempts: u32, error: &str) {
    tracing::error!(
        event_type = events::SIGNATURE_DISCARDED,
        correlation_id = %correlation_id,
        register_id = %register_id,
        attempts = attempts,
        error = %error,
        "Signature could not be persisted and was discarded"
    );
}

/// Log a bounded wait that expired.
pub fn log_chain_busy(correlation_id: &str, register_id: &str, waited: Duration) {
    tracing::warn!(
        event_type = events::CHAIN_BUSY,
        correlation_id = %correlation_id,
        register_id = %register_id,
        waited_ms = waited.as_millis() as u64,
        "Chain extension right not acquired in time"
    );
    metrics::counter!(metric_names::CHAIN_BUSY_TOTAL).increment(1);
}

/// Record how long a caller waited for a register's extension right.
pub fn record_lock_wait(waited: Duration) {
    metrics::histogram!(metric_names::LOCK_WAIT_SECONDS).record(waited.as_secs_f64());
}

/// Log a key provider failure.
pub fn log_key_unavailable(correlation_id: &str, register_id: &str, provider: &str, error: &str) {
    tracing::error!(
        event_type = events::KEY_UNAVAILABLE,
        correlation_id = %correlation_id,
        register_id = %register_id,
        provider = %provider,
        error = %error,
        "Signing key unavailable, refusing to sign"
    );
}

/// Log that certificate status could not be determined.
pub fn log_certificate_degraded(error: &str) {
    tracing::warn!(
        event_type = events::CERTIFICATE_DEGRADED,
        error = %error,
        "Certificate status unknown"
    );
}

/// Log a successful verification.
pub fn log_verification_success(register_id: &str, tier: &str) {
    tracing::info!(
        event_type = events::VERIFICATION_SUCCESS,
        register_id = %register_id,
        tier = %tier,
        "Signature verified"
    );
    metrics::counter!(metric_names::VERIFICATIONS_TOTAL, "outcome" => "success").increment(1);
}

/// Log a failed verification.
pub fn log_verification_failure(register_id: Option<&str>, failure_reason: &str) {
    tracing::warn!(
        event_type = events::VERIFICATION_FAILURE,
        register_id = register_id.unwrap_or("<unknown>"),
        failure_reason = %failure_reason,
        "Signature verification failed"
    );
    metrics::counter!(metric_names::VERIFICATIONS_TOTAL, "outcome" => "failure").increment(1);
}

/// Log that a record was marked invalid.
pub fn log_signature_invalidated(register_id: &str, document_reference: &str, reason: &str) {
    tracing::warn!(
        event_type = events::SIGNATURE_INVALIDATED,
        register_id = %register_id,
        document_reference = %document_reference,
        reason = %reason,
        "Signature marked invalid"
    );
}

/// Log a violation found by a chain audit.
pub fn log_chain_audit_violation(register_id: &str, chain_position: i64, violation: &str) {
    tracing::error!(
        event_type = events::CHAIN_AUDIT_VIOLATION,
        register_id = %register_id,
        chain_position = chain_position,
        violation = %violation,
        "Chain audit violation"
    );
}
