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

use crate::chain::ChainConfig;
use crate::keys::{parse_encryption_key, KeyError, KeyMaterialProvider, SoftwareKeyProvider};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiscalConfig {
    pub database: DatabaseConfig,
    pub chain: ChainSettings,
    pub keys: KeyConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    /// Ignored for SQLite, which always uses one connection
    pub pool_size: u32,
    /// Longest wait for a pooled connection
    pub pool_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "fiskal.db".to_string(),
            pool_size: 1,
            pool_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    pub fn pool_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    pub lock_timeout_ms: u64,
    pub max_persist_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5000,
            max_persist_attempts: 3,
            retry_backoff_ms: 50,
        }
    }
}

impl ChainSettings {
    pub fn to_chain_config(&self) -> ChainConfig {
        ChainConfig::builder()
            .lock_timeout(Duration::from_millis(self.lock_timeout_ms))
            .max_persist_attempts(self.max_persist_attempts)
            .retry_backoff(Duration::from_millis(self.retry_backoff_ms))
            .build()
    }
}

/// Where signing keys come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// PKCS#8 key and certificate loaded from PEM files
    Software,
    /// AES-256-GCM encrypted PKCS#8 key and a PEM certificate
    Encrypted,
    /// Fresh key and self-signed certificate generated at startup
    #[default]
    Emulated,
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMode::Software => f.write_str("software"),
            KeyMode::Encrypted => f.write_str("encrypted"),
            KeyMode::Emulated => f.write_str("emulated"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    pub mode: KeyMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_path: Option<PathBuf>,
    /// Hex master key for `encrypted` mode, usually `${FISKAL_KEY_ENCRYPTION_KEY:?...}`
    #[serde(skip_serializing)]
    pub encryption_key: Option<String>,
    pub common_name: String,
    pub validity_days: u32,
}

impl fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyConfig")
            .field("mode", &self.mode)
            .field("private_key_path", &self.private_key_path)
            .field("certificate_path", &self.certificate_path)
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "<redacted>"))
            .field("common_name", &self.common_name)
            .field("validity_days", &self.validity_days)
            .finish()
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            mode: KeyMode::Emulated,
            private_key_path: None,
            certificate_path: None,
            encryption_key: None,
            common_name: "Fiskal Emulated Register".to_string(),
            validity_days: 365,
        }
    }
}

impl KeyConfig {
    /// Creates the configured key material provider.
    pub fn build_provider(&self) -> Result<Arc<dyn KeyMaterialProvider>, KeyError> {
        let provider = match self.mode {
            KeyMode::Software => {
                let (Some(key_path), Some(certificate_path)) =
                    (&self.private_key_path, &self.certificate_path)
                else {
                    return Err(KeyError::NotProvisioned);
                };
                SoftwareKeyProvider::from_pem_files(key_path, certificate_path)?
            }
            KeyMode::Encrypted => {
                let (Some(key_path), Some(certificate_path), Some(encryption_key)) = (
                    &self.private_key_path,
                    &self.certificate_path,
                    &self.encryption_key,
                ) else {
                    return Err(KeyError::NotProvisioned);
                };
                let encryption_key = parse_encryption_key(encryption_key)?;
                SoftwareKeyProvider::from_encrypted_key_file(
                    key_path,
                    certificate_path,
                    &encryption_key,
                )?
            }
            KeyMode::Emulated => {
                SoftwareKeyProvider::emulated(&self.common_name, self.validity_days)?
            }
        };
        Ok(Arc::new(provider))
    }
}

impl FiscalConfig {
    pub fn builder() -> FiscalConfigBuilder {
        FiscalConfigBuilder::default()
    }
}

/// Builder for [`FiscalConfig`], for embedding without a config file.
#[derive(Debug, Clone, Default)]
pub struct FiscalConfigBuilder {
    config: FiscalConfig,
}

impl FiscalConfigBuilder {
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database.url = url.into();
        self
    }

    pub fn pool_size(mut self, size: u32) -> Self {
        self.config.database.pool_size = size;
        self
    }

    pub fn pool_timeout_ms(mut self, value: u64) -> Self {
        self.config.database.pool_timeout_ms = value;
        self
    }

    pub fn lock_timeout_ms(mut self, value: u64) -> Self {
        self.config.chain.lock_timeout_ms = value;
        self
    }

    pub fn max_persist_attempts(mut self, value: u32) -> Self {
        self.config.chain.max_persist_attempts = value;
        self
    }

    pub fn retry_backoff_ms(mut self, value: u64) -> Self {
        self.config.chain.retry_backoff_ms = value;
        self
    }

    /// Loads keys from PEM files.
    pub fn software_keys(mut self, private_key_path: impl Into<PathBuf>, certificate_path: impl Into<PathBuf>) -> Self {
        self.config.keys.mode = KeyMode::Software;
        self.config.keys.private_key_path = Some(private_key_path.into());
        self.config.keys.certificate_path = Some(certificate_path.into());
        self
    }

    /// Loads an AES-256-GCM encrypted key and its certificate.
    pub fn encrypted_keys(
        mut self,
        private_key_path: impl Into<PathBuf>,
        certificate_path: impl Into<PathBuf>,
        encryption_key: impl Into<String>,
    ) -> Self {
        self.config.keys.mode = KeyMode::Encrypted;
        self.config.keys.private_key_path = Some(private_key_path.into());
        self.config.keys.certificate_path = Some(certificate_path.into());
        self.config.keys.encryption_key = Some(encryption_key.into());
        self
    }

    /// Generates keys at startup.
    pub fn emulated_keys(mut self, common_name: impl Into<String>, validity_days: u32) -> Self {
        self.config.keys.mode = KeyMode::Emulated;
        self.config.keys.common_name = common_name.into();
        self.config.keys.validity_days = validity_days;
        self
    }

    pub fn build(self) -> FiscalConfig {
        self.config
    }
}
