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

//! Hardware-backed key material.
//!
//! A [`SignatureDevice`] is anything that holds a non-exportable P-256 key
//! and can sign with it: a smart card, a TSE module, a TPM or a PKCS#11
//! token. [`HardwareKeyProvider`] adapts such a device to the
//! [`KeyMaterialProvider`] contract.

use super::{KeyError, KeyMaterialProvider, SigningHandle};
use crate::certificate;
use p256::ecdsa::{Signature, VerifyingKey};
use std::sync::Arc;

/// Minimal operations a signature device must support.
pub trait SignatureDevice: Send + Sync + 'static {
    /// Signs `message` with ECDSA P-256 over SHA-256.
    ///
    /// Either the raw 64-byte `r || s` form or a DER-encoded signature is accepted.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError>;

    /// SEC1-encoded public key of the signing key.
    fn public_key_sec1(&self) -> Result<Vec<u8>, KeyError>;

    /// DER or PEM certificate stored on the device.
    fn certificate(&self) -> Result<Vec<u8>, KeyError>;

    /// Lowercase hex serial number of the stored certificate.
    ///
    /// Read from the device's own object metadata, not by parsing
    /// [`certificate`](Self::certificate). A damaged certificate blob then only
    /// affects certificate status reporting.
    fn certificate_serial(&self) -> Result<String, KeyError>;
}

/// Key material provider backed by a [`SignatureDevice`].
pub struct HardwareKeyProvider<D: SignatureDevice> {
    device: Arc<D>,
}

impl<D: SignatureDevice> HardwareKeyProvider<D> {
    pub fn new(device: D) -> Self {
        Self {
            device: Arc::new(device),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }
}

struct DeviceHandle<D: SignatureDevice> {
    device: Arc<D>,
}

impl<D: SignatureDevice> SigningHandle for DeviceHandle<D> {
    fn sign_message(&self, message: &[u8]) -> Result<Signature, KeyError> {
        let bytes = self.device.sign(message)?;
        let signature = if bytes.len() == 64 {
            Signature::from_slice(&bytes)
        } else {
            Signature::from_der(&bytes)
        };
        signature.map_err(|e| KeyError::Device(format!("device returned invalid signature: {}", e)))
    }
}

impl<D: SignatureDevice> KeyMaterialProvider for HardwareKeyProvider<D> {
    fn current_key(&self) -> Result<Arc<dyn SigningHandle>, KeyError> {
        // Touch the device so an unplugged token fails here, not mid-signature.
        self.device.public_key_sec1()?;
        let handle: Arc<dyn SigningHandle> = Arc::new(DeviceHandle {
            device: self.device.clone(),
        });
        Ok(handle)
    }

    fn public_key(&self) -> Result<VerifyingKey, KeyError> {
        let sec1 = self.device.public_key_sec1()?;
        VerifyingKey::from_sec1_bytes(&sec1).map_err(|e| KeyError::InvalidKey(e.to_string()))
    }

    fn certificate_bytes(&self) -> Result<Vec<u8>, KeyError> {
        let raw = self.device.certificate()?;
        certificate::to_der(&raw).map_err(|e| KeyError::InvalidCertificate(e.to_string()))
    }

    fn certificate_serial_number(&self) -> Result<String, KeyError> {
        self.device.certificate_serial()
    }

    fn provider_kind(&self) -> &'static str {
        "hardware"
    }
}
