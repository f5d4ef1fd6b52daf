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

//! AES-256-GCM encryption for software signing keys at rest.
//!
//! The PKCS#8 DER encoding of the key is encrypted. The stored format is
//! `nonce (12 bytes) || ciphertext || tag (16 bytes)`. The 32-byte master key
//! is exchanged as 64 hex characters, typically through an environment
//! variable.

use super::KeyError;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

/// Size of the AES-256-GCM nonce in bytes.
const NONCE_SIZE: usize = 12;

/// Size of the AES-256-GCM tag in bytes.
const TAG_SIZE: usize = 16;

/// Size of the AES-256 master key in bytes.
pub const ENCRYPTION_KEY_SIZE: usize = 32;

/// Decodes a hex master key.
pub fn parse_encryption_key(hex_key: &str) -> Result<[u8; ENCRYPTION_KEY_SIZE], KeyError> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|e| KeyError::Encryption(format!("encryption key is not valid hex: {}", e)))?;
    <[u8; ENCRYPTION_KEY_SIZE]>::try_from(bytes.as_slice()).map_err(|_| {
        KeyError::Encryption(format!(
            "expected a {}-byte key, got {} bytes",
            ENCRYPTION_KEY_SIZE,
            bytes.len()
        ))
    })
}

/// Generates a random master key.
pub fn generate_encryption_key() -> [u8; ENCRYPTION_KEY_SIZE] {
    let mut key = [0u8; ENCRYPTION_KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

fn cipher(encryption_key: &[u8]) -> Result<Aes256Gcm, KeyError> {
    if encryption_key.len() != ENCRYPTION_KEY_SIZE {
        return Err(KeyError::Encryption(format!(
            "expected a {}-byte key, got {} bytes",
            ENCRYPTION_KEY_SIZE,
            encryption_key.len()
        )));
    }
    Aes256Gcm::new_from_slice(encryption_key).map_err(|e| KeyError::Encryption(e.to_string()))
}

/// Encrypts private key bytes with a 32-byte AES-256 key.
pub fn encrypt_private_key(private_key: &[u8], encryption_key: &[u8]) -> Result<Vec<u8>, KeyError> {
    let cipher = cipher(encryption_key)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, private_key)
        .map_err(|e| KeyError::Encryption(e.to_string()))?;

    let mut encrypted = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    encrypted.extend_from_slice(&nonce_bytes);
    encrypted.extend_from_slice(&ciphertext);
    Ok(encrypted)
}

/// Decrypts data produced by [`encrypt_private_key`].
pub fn decrypt_private_key(encrypted_data: &[u8], encryption_key: &[u8]) -> Result<Vec<u8>, KeyError> {
    let cipher = cipher(encryption_key)?;

    if encrypted_data.len() <= NONCE_SIZE + TAG_SIZE {
        return Err(KeyError::Decryption("encrypted data too short".to_string()));
    }

    let (nonce, ciphertext) = encrypted_data.split_at(NONCE_SIZE);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| KeyError::Decryption(e.to_string()))
}
