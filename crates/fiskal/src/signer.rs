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

//! Compact token signing.
//!
//! Tokens use the JWS compact serialization:
//! `base64url(header) "." base64url(payload) "." base64url(signature)`, all
//! without padding. The header and payload segments are the canonical JSON
//! bytes, and the signature is the raw 64-byte `r || s` ES256 value computed
//! over the first two segments joined by `.`.
//!
//! Signing does no I/O. Persisting the token is the coordinator's job.

use crate::error::ChainError;
use crate::keys::KeyMaterialProvider;
use crate::payload::{CanonicalPayload, PayloadError};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use p256::ecdsa::{signature::Verifier, Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// JWS algorithm identifier for ECDSA P-256 with SHA-256.
pub const ALGORITHM: &str = "ES256";

/// JWS `typ` header value.
pub const TOKEN_TYPE: &str = "JWT";

/// Errors that can occur when decoding a compact token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Invalid base64url segment: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid token JSON: {0}")]
    Json(#[from] PayloadError),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid signature encoding: {0}")]
    InvalidSignature(String),
}

/// Protected header of a fiscal token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    /// Serial number of the signing certificate
    pub kid: String,
    pub typ: String,
}

impl TokenHeader {
    pub fn es256(certificate_serial: impl Into<String>) -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            kid: certificate_serial.into(),
            typ: TOKEN_TYPE.to_string(),
        }
    }
}

/// A signed compact token. This string is the record's signature value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompactToken(String);

impl CompactToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CompactToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CompactToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Signs canonical payloads with the provider's current key.
#[derive(Clone)]
pub struct FiscalSigner {
    keys: Arc<dyn KeyMaterialProvider>,
}

impl FiscalSigner {
    pub fn new(keys: Arc<dyn KeyMaterialProvider>) -> Self {
        Self { keys }
    }

    /// Produces the compact token for `payload`.
    ///
    /// `correlation_id` is only attached to diagnostics. It is never part of
    /// the signed bytes. Fails with `KeyUnavailable` when the provider cannot
    /// supply a key or the key refuses to sign.
    pub fn sign(
        &self,
        payload: &CanonicalPayload,
        correlation_id: &str,
    ) -> Result<CompactToken, ChainError> {
        let key = self.keys.current_key()?;

        let header = TokenHeader::es256(payload.certificate_serial.clone());
        let header_bytes = serde_jcs::to_vec(&header).map_err(PayloadError::from)?;
        let payload_bytes = payload.to_canonical_bytes()?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_bytes),
            URL_SAFE_NO_PAD.encode(payload_bytes)
        );
        let signature = key.sign_message(signing_input.as_bytes())?;

        debug!(
            correlation_id = %correlation_id,
            register_id = %payload.register_id,
            document_number = %payload.document_number,
            provider = self.keys.provider_kind(),
            "Signed fiscal payload"
        );

        Ok(CompactToken(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        )))
    }
}

/// A structurally parsed token.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub header: TokenHeader,
    pub payload: CanonicalPayload,
    /// The transmitted `header.payload` segments
    pub signing_input: String,
    pub signature: Signature,
}

impl DecodedToken {
    /// Checks the signature against `public_key`.
    pub fn verify(&self, public_key: &VerifyingKey) -> bool {
        public_key
            .verify(self.signing_input.as_bytes(), &self.signature)
            .is_ok()
    }
}

/// Splits and decodes a compact token without checking its signature.
pub fn decode_token(token: &str) -> Result<DecodedToken, TokenError> {
    let mut segments = token.split('.');
    let (header_b64, payload_b64, signature_b64) =
        match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => {
                return Err(TokenError::Malformed(
                    "expected three dot-separated segments".to_string(),
                ))
            }
        };

    let header: TokenHeader = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_b64)?)
        .map_err(PayloadError::from)?;
    if header.alg != ALGORITHM {
        return Err(TokenError::UnsupportedAlgorithm(header.alg));
    }

    let payload = CanonicalPayload::from_slice(&URL_SAFE_NO_PAD.decode(payload_b64)?)?;

    let signature_bytes = URL_SAFE_NO_PAD.decode(signature_b64)?;
    let signature = Signature::from_slice(&signature_bytes)
        .map_err(|e| TokenError::InvalidSignature(e.to_string()))?;

    Ok(DecodedToken {
        header,
        signing_input: format!("{}.{}", header_b64, payload_b64),
        payload,
        signature,
    })
}

/// Whether `token` is a well-formed ES256 token signed by `public_key`.
///
/// Never fails: anything that cannot be decoded is simply not valid.
pub fn verify_token_signature(token: &str, public_key: &VerifyingKey) -> bool {
    match decode_token(token) {
        Ok(decoded) => decoded.verify(public_key),
        Err(_) => false,
    }
}
