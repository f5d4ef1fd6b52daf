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

//! Key material providers.
//!
//! The [`KeyMaterialProvider`] trait is the only view the signing path has of
//! key material. Whether the private key lives in process memory
//! ([`SoftwareKeyProvider`]) or inside a signature device
//! ([`HardwareKeyProvider`]) is invisible to the coordinator and verifier.
//!
//! Providers are called on every signing operation, so implementations must
//! be fast and free of side effects. A provider that cannot supply a key
//! returns an error; there is no fallback key.

mod hardware;
pub mod key_encryption;
mod software;

pub use hardware::{HardwareKeyProvider, SignatureDevice};
pub use key_encryption::{generate_encryption_key, parse_encryption_key, ENCRYPTION_KEY_SIZE};
pub use software::SoftwareKeyProvider;

use p256::ecdsa::{signature::Signer, Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while obtaining or using key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("No signing key has been provisioned")]
    NotProvisioned,

    #[error("Signature device error: {0}")]
    Device(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid PEM format: {0}")]
    InvalidPem(String),

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("Certificate does not belong to the signing key")]
    CertificateMismatch,

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Certificate generation failed: {0}")]
    CertificateGeneration(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

/// A key that can produce ES256 signatures.
pub trait SigningHandle: Send + Sync {
    /// Signs `message` with ECDSA P-256 over SHA-256.
    fn sign_message(&self, message: &[u8]) -> Result<Signature, KeyError>;
}

impl SigningHandle for SigningKey {
    fn sign_message(&self, message: &[u8]) -> Result<Signature, KeyError> {
        self.try_sign(message)
            .map_err(|e| KeyError::SigningFailed(e.to_string()))
    }
}

/// Capability supplying the active signing key and its certificate.
///
/// Implementations must be thread-safe (`Send + Sync`). Key material is
/// read-only for the lifetime of a provider.
pub trait KeyMaterialProvider: Send + Sync {
    /// The key used for the next signature.
    fn current_key(&self) -> Result<Arc<dyn SigningHandle>, KeyError>;

    /// Public counterpart of [`current_key`](Self::current_key).
    fn public_key(&self) -> Result<VerifyingKey, KeyError>;

    /// Raw DER bytes of the signing certificate.
    fn certificate_bytes(&self) -> Result<Vec<u8>, KeyError>;

    /// Lowercase hex serial number of the signing certificate.
    fn certificate_serial_number(&self) -> Result<String, KeyError>;

    /// Short name for logs, e.g. `software` or `hardware`.
    fn provider_kind(&self) -> &'static str;
}

/// Computes the SHA256 hex fingerprint of a public key.
///
/// The fingerprint covers the uncompressed SEC1 encoding of the point.
pub fn key_fingerprint(public_key: &VerifyingKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(public_key.to_encoded_point(false).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Verifier;

    #[test]
    fn test_signing_key_is_a_handle() {
        let key = SigningKey::random(&mut rand::thread_rng());
        let handle: Arc<dyn SigningHandle> = Arc::new(key.clone());

        let signature = handle.sign_message(b"fiscal").unwrap();
        assert!(key.verifying_key().verify(b"fiscal", &signature).is_ok());
        assert_eq!(signature.to_bytes().len(), 64);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let key = SigningKey::random(&mut rand::thread_rng());
        let a = key_fingerprint(key.verifying_key());
        let b = key_fingerprint(key.verifying_key());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let other = SigningKey::random(&mut rand::thread_rng());
        assert_ne!(a, key_fingerprint(other.verifying_key()));
    }
}
