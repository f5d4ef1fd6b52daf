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

//! X.509 certificate inspection.
//!
//! Certificate information is derived on demand from the provider's
//! certificate bytes and never stored. A certificate that cannot be parsed
//! degrades status reporting to [`CertificateStatus::Unknown`]; it never
//! blocks signing, which only needs the key.

use chrono::{DateTime, Utc};
use p256::ecdsa::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use x509_cert::der::Decode;
use x509_cert::Certificate;

/// Errors that can occur when parsing a certificate.
#[derive(Debug, Error)]
pub enum CertificateParseError {
    #[error("Malformed certificate: {0}")]
    MalformedDer(String),

    #[error("Invalid PEM format: {0}")]
    InvalidPem(String),

    #[error("Certificate validity window is not representable")]
    InvalidValidity,

    #[error("Unsupported public key: {0}")]
    UnsupportedKey(String),
}

/// Information extracted from a signing certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    /// Lowercase hex of the DER serial number content
    pub serial_number: String,
    pub subject: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    /// `valid_from <= now <= valid_until` at parse time
    pub is_valid: bool,
}

impl CertificateInfo {
    pub fn status_at(&self, now: DateTime<Utc>) -> CertificateStatus {
        if now < self.valid_from {
            CertificateStatus::NotYetValid
        } else if now > self.valid_until {
            CertificateStatus::Expired
        } else {
            CertificateStatus::Valid
        }
    }
}

/// Reported state of the signing certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateStatus {
    Valid,
    Expired,
    NotYetValid,
    /// The certificate could not be read or parsed
    Unknown(String),
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateStatus::Valid => f.write_str("valid"),
            CertificateStatus::Expired => f.write_str("expired"),
            CertificateStatus::NotYetValid => f.write_str("not yet valid"),
            CertificateStatus::Unknown(reason) => write!(f, "unknown ({})", reason),
        }
    }
}

/// Parses PEM or DER certificate bytes, evaluating validity against the current time.
pub fn parse_certificate(bytes: &[u8]) -> Result<CertificateInfo, CertificateParseError> {
    parse_certificate_at(bytes, Utc::now())
}

/// Parses PEM or DER certificate bytes, evaluating validity against `now`.
pub fn parse_certificate_at(
    bytes: &[u8],
    now: DateTime<Utc>,
) -> Result<CertificateInfo, CertificateParseError> {
    let cert = decode(bytes)?;
    let tbs = &cert.tbs_certificate;

    let valid_from = to_datetime(tbs.validity.not_before.to_unix_duration())?;
    let valid_until = to_datetime(tbs.validity.not_after.to_unix_duration())?;

    Ok(CertificateInfo {
        serial_number: hex::encode(tbs.serial_number.as_bytes()),
        subject: tbs.subject.to_string(),
        valid_from,
        valid_until,
        is_valid: valid_from <= now && now <= valid_until,
    })
}

/// Extracts the P-256 public key a certificate was issued for.
pub fn certificate_public_key(bytes: &[u8]) -> Result<VerifyingKey, CertificateParseError> {
    let cert = decode(bytes)?;
    let spki = &cert.tbs_certificate.subject_public_key_info;
    VerifyingKey::from_sec1_bytes(spki.subject_public_key.raw_bytes())
        .map_err(|e| CertificateParseError::UnsupportedKey(e.to_string()))
}

/// Returns the DER form of PEM or DER certificate bytes.
pub fn to_der(bytes: &[u8]) -> Result<Vec<u8>, CertificateParseError> {
    if looks_like_pem(bytes) {
        let parsed = pem::parse(bytes).map_err(|e| CertificateParseError::InvalidPem(e.to_string()))?;
        if parsed.tag() != "CERTIFICATE" {
            return Err(CertificateParseError::InvalidPem(format!(
                "expected a CERTIFICATE block, found {}",
                parsed.tag()
            )));
        }
        Ok(parsed.contents().to_vec())
    } else {
        Ok(bytes.to_vec())
    }
}

fn decode(bytes: &[u8]) -> Result<Certificate, CertificateParseError> {
    let der = to_der(bytes)?;
    Certificate::from_der(&der).map_err(|e| CertificateParseError::MalformedDer(e.to_string()))
}

fn looks_like_pem(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map(|start| bytes[start..].starts_with(b"-----BEGIN"))
        .unwrap_or(false)
}

fn to_datetime(since_epoch: Duration) -> Result<DateTime<Utc>, CertificateParseError> {
    let secs = i64::try_from(since_epoch.as_secs()).map_err(|_| CertificateParseError::InvalidValidity)?;
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or(CertificateParseError::InvalidValidity)
}
