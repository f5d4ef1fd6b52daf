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

//! Software-emulated key material.

use super::key_encryption::{decrypt_private_key, encrypt_private_key};
use super::{key_fingerprint, KeyError, KeyMaterialProvider, SigningHandle};
use crate::certificate::{self, CertificateParseError};
use chrono::{Datelike, Duration, Utc};
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rand::RngCore;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SerialNumber};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Length of generated certificate serial numbers in bytes.
const SERIAL_LENGTH: usize = 16;

/// Key material held in process memory.
///
/// Used for development, tests and deployments that have not yet been
/// provisioned with a signature device.
pub struct SoftwareKeyProvider {
    signing_key: Arc<SigningKey>,
    verifying_key: VerifyingKey,
    certificate_der: Vec<u8>,
    serial_number: String,
}

impl fmt::Debug for SoftwareKeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareKeyProvider")
            .field("fingerprint", &key_fingerprint(&self.verifying_key))
            .field("serial_number", &self.serial_number)
            .finish_non_exhaustive()
    }
}

impl SoftwareKeyProvider {
    /// Creates a provider from a key and the certificate issued for it.
    ///
    /// The certificate may be PEM or DER. It must carry the key's public half.
    pub fn new(signing_key: SigningKey, certificate: &[u8]) -> Result<Self, KeyError> {
        let certificate_der = certificate::to_der(certificate).map_err(invalid_certificate)?;
        let info = certificate::parse_certificate(&certificate_der).map_err(invalid_certificate)?;
        let certified_key =
            certificate::certificate_public_key(&certificate_der).map_err(invalid_certificate)?;

        let verifying_key = *signing_key.verifying_key();
        if certified_key != verifying_key {
            return Err(KeyError::CertificateMismatch);
        }

        Ok(Self {
            signing_key: Arc::new(signing_key),
            verifying_key,
            certificate_der,
            serial_number: info.serial_number,
        })
    }

    /// Generates a fresh key and a self-signed certificate.
    ///
    /// The certificate is valid from the start of today (UTC) for
    /// `validity_days` days and carries a random positive serial number.
    pub fn emulated(common_name: &str, validity_days: u32) -> Result<Self, KeyError> {
        if validity_days == 0 {
            return Err(KeyError::CertificateGeneration(
                "validity must be at least one day".to_string(),
            ));
        }

        let today = Utc::now().date_naive();
        let until = today + Duration::days(i64::from(validity_days));

        let mut params = CertificateParams::default();
        params.distinguished_name = DistinguishedName::new();
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        params.not_before =
            rcgen::date_time_ymd(today.year(), today.month() as u8, today.day() as u8);
        params.not_after =
            rcgen::date_time_ymd(until.year(), until.month() as u8, until.day() as u8);
        params.serial_number = Some(SerialNumber::from_slice(&random_serial()));

        let key_pair =
            KeyPair::generate().map_err(|e| KeyError::CertificateGeneration(e.to_string()))?;
        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| KeyError::CertificateGeneration(e.to_string()))?;

        let signing_key = SigningKey::from_pkcs8_der(&key_pair.serialize_der())
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;

        Self::new(signing_key, cert.der().as_ref())
    }

    /// Loads a PKCS#8 PEM private key and a PEM or DER certificate.
    pub fn from_pem_files(key_path: &Path, certificate_path: &Path) -> Result<Self, KeyError> {
        let key_pem = std::fs::read_to_string(key_path).map_err(|source| KeyError::Io {
            path: key_path.to_path_buf(),
            source,
        })?;
        let signing_key =
            SigningKey::from_pkcs8_pem(&key_pem).map_err(|e| KeyError::InvalidPem(e.to_string()))?;

        Self::new(signing_key, &read_file(certificate_path)?)
    }

    /// Loads a private key encrypted with [`encrypted_private_key`](Self::encrypted_private_key).
    pub fn from_encrypted_key_file(
        key_path: &Path,
        certificate_path: &Path,
        encryption_key: &[u8],
    ) -> Result<Self, KeyError> {
        let encrypted = read_file(key_path)?;
        let der = decrypt_private_key(&encrypted, encryption_key)?;
        let signing_key =
            SigningKey::from_pkcs8_der(&der).map_err(|e| KeyError::InvalidKey(e.to_string()))?;

        Self::new(signing_key, &read_file(certificate_path)?)
    }

    pub fn fingerprint(&self) -> String {
        key_fingerprint(&self.verifying_key)
    }

    /// PKCS#8 PEM encoding of the private key.
    pub fn private_key_pem(&self) -> Result<String, KeyError> {
        self.signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| KeyError::InvalidKey(e.to_string()))
    }

    pub fn certificate_pem(&self) -> String {
        pem::encode(&pem::Pem::new("CERTIFICATE", self.certificate_der.clone()))
    }

    /// AES-256-GCM encrypted PKCS#8 DER encoding of the private key.
    pub fn encrypted_private_key(&self, encryption_key: &[u8]) -> Result<Vec<u8>, KeyError> {
        let der = self
            .signing_key
            .to_pkcs8_der()
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        encrypt_private_key(der.as_bytes(), encryption_key)
    }

    /// Writes the private key and certificate as PEM files.
    pub fn write_pem_files(&self, key_path: &Path, certificate_path: &Path) -> Result<(), KeyError> {
        write_file(key_path, self.private_key_pem()?.as_bytes())?;
        write_file(certificate_path, self.certificate_pem().as_bytes())
    }

    /// Writes the encrypted private key and the PEM certificate.
    ///
    /// The key file is readable with [`from_encrypted_key_file`](Self::from_encrypted_key_file).
    pub fn write_encrypted_files(
        &self,
        key_path: &Path,
        certificate_path: &Path,
        encryption_key: &[u8],
    ) -> Result<(), KeyError> {
        write_file(key_path, &self.encrypted_private_key(encryption_key)?)?;
        write_file(certificate_path, self.certificate_pem().as_bytes())
    }
}

impl KeyMaterialProvider for SoftwareKeyProvider {
    fn current_key(&self) -> Result<Arc<dyn SigningHandle>, KeyError> {
        Ok(self.signing_key.clone() as Arc<dyn SigningHandle>)
    }

    fn public_key(&self) -> Result<VerifyingKey, KeyError> {
        Ok(self.verifying_key)
    }

    fn certificate_bytes(&self) -> Result<Vec<u8>, KeyError> {
        Ok(self.certificate_der.clone())
    }

    fn certificate_serial_number(&self) -> Result<String, KeyError> {
        Ok(self.serial_number.clone())
    }

    fn provider_kind(&self) -> &'static str {
        "software"
    }
}

fn invalid_certificate(e: CertificateParseError) -> KeyError {
    KeyError::InvalidCertificate(e.to_string())
}

/// Random serial with the sign bit cleared and a nonzero leading byte, so
/// the DER integer content is exactly the generated bytes.
fn random_serial() -> [u8; SERIAL_LENGTH] {
    let mut serial = [0u8; SERIAL_LENGTH];
    rand::thread_rng().fill_bytes(&mut serial);
    serial[0] = (serial[0] & 0x7f).max(1);
    serial
}

fn read_file(path: &Path) -> Result<Vec<u8>, KeyError> {
    std::fs::read(path).map_err(|source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), KeyError> {
    std::fs::write(path, contents).map_err(|source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    })
}
