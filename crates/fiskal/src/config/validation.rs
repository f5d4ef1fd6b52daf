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

use super::types::{ChainSettings, DatabaseConfig, FiscalConfig, KeyConfig, KeyMode};
use super::ValidationError;
use crate::database::BackendType;
use crate::keys::parse_encryption_key;

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for FiscalConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors: Vec<ValidationError> = [
            self.database.validate(),
            self.chain.validate(),
            self.keys.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple { errors }),
        }
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        BackendType::from_url(&self.url).map_err(|e| ValidationError::InvalidDatabaseUrl {
            message: e.to_string(),
        })?;

        if self.pool_size == 0 || self.pool_size > 100 {
            return Err(ValidationError::InvalidPoolSize {
                size: self.pool_size,
            });
        }

        if self.pool_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout {
                field: "pool_timeout_ms",
                value: self.pool_timeout_ms,
            });
        }

        Ok(())
    }
}

impl Validate for ChainSettings {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.lock_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout {
                field: "lock_timeout_ms",
                value: self.lock_timeout_ms,
            });
        }
        if self.retry_backoff_ms == 0 {
            return Err(ValidationError::InvalidTimeout {
                field: "retry_backoff_ms",
                value: self.retry_backoff_ms,
            });
        }
        if self.max_persist_attempts == 0 {
            return Err(ValidationError::InvalidAttempts {
                attempts: self.max_persist_attempts,
            });
        }
        Ok(())
    }
}

impl Validate for KeyConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.mode {
            KeyMode::Software | KeyMode::Encrypted => {
                if self.private_key_path.is_none() {
                    return Err(ValidationError::MissingPath {
                        field: "private_key_path",
                        mode: self.mode,
                    });
                }
                if self.certificate_path.is_none() {
                    return Err(ValidationError::MissingPath {
                        field: "certificate_path",
                        mode: self.mode,
                    });
                }
                if self.mode == KeyMode::Encrypted {
                    let key = self
                        .encryption_key
                        .as_deref()
                        .ok_or(ValidationError::MissingEncryptionKey)?;
                    parse_encryption_key(key).map_err(|e| {
                        ValidationError::InvalidEncryptionKey {
                            message: e.to_string(),
                        }
                    })?;
                }
            }
            KeyMode::Emulated => {
                if self.validity_days == 0 {
                    return Err(ValidationError::InvalidValidity {
                        days: self.validity_days,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(FiscalConfig::default().validate().is_ok());
    }

    #[test]
    fn test_pool_size_bounds() {
        let mut database = DatabaseConfig::default();
        database.pool_size = 0;
        assert!(matches!(
            database.validate(),
            Err(ValidationError::InvalidPoolSize { size: 0 })
        ));
        database.pool_size = 101;
        assert!(database.validate().is_err());
        database.pool_size = 100;
        assert!(database.validate().is_ok());
    }

    #[test]
    fn test_empty_url_rejected() {
        let database = DatabaseConfig {
            url: String::new(),
            ..DatabaseConfig::default()
        };
        assert!(matches!(
            database.validate(),
            Err(ValidationError::InvalidDatabaseUrl { .. })
        ));
    }

    #[test]
    fn test_software_keys_need_paths() {
        let keys = KeyConfig {
            mode: KeyMode::Software,
            certificate_path: Some("/keys/signing.crt.pem".into()),
            ..KeyConfig::default()
        };
        match keys.validate() {
            Err(ValidationError::MissingPath { field, .. }) => assert_eq!(field, "private_key_path"),
            other => panic!("expected MissingPath, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_pool_timeout_rejected() {
        let database = DatabaseConfig {
            pool_timeout_ms: 0,
            ..DatabaseConfig::default()
        };
        assert!(matches!(
            database.validate(),
            Err(ValidationError::InvalidTimeout {
                field: "pool_timeout_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_encrypted_keys_need_master_key() {
        let mut keys = KeyConfig {
            mode: KeyMode::Encrypted,
            private_key_path: Some("/keys/signing.key.enc".into()),
            certificate_path: Some("/keys/signing.crt.pem".into()),
            ..KeyConfig::default()
        };
        assert!(matches!(
            keys.validate(),
            Err(ValidationError::MissingEncryptionKey)
        ));

        keys.encryption_key = Some("not hex".to_string());
        assert!(matches!(
            keys.validate(),
            Err(ValidationError::InvalidEncryptionKey { .. })
        ));

        keys.encryption_key = Some("ab".repeat(16));
        assert!(matches!(
            keys.validate(),
            Err(ValidationError::InvalidEncryptionKey { .. })
        ));

        keys.encryption_key = Some("ab".repeat(32));
        assert!(keys.validate().is_ok());
    }

    #[test]
    fn test_errors_are_collected() {
        let config = FiscalConfig {
            database: DatabaseConfig {
                url: "ledger.db".to_string(),
                pool_size: 0,
                ..DatabaseConfig::default()
            },
            chain: ChainSettings {
                max_persist_attempts: 0,
                ..ChainSettings::default()
            },
            keys: KeyConfig::default(),
        };
        match config.validate() {
            Err(ValidationError::Multiple { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("expected Multiple, got {:?}", other),
        }
    }
}
