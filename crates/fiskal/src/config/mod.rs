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

//! File-based configuration.
//!
//! Configuration is read from TOML. `${VAR}`, `${VAR:-default}` and
//! `${VAR:?message}` references are substituted from the environment before
//! parsing. See [`ConfigLoader`] for the search order.

mod loader;
mod types;
mod validation;

pub use loader::ConfigLoader;
pub use types::{ChainSettings, DatabaseConfig, FiscalConfig, FiscalConfigBuilder, KeyConfig, KeyMode};
pub use validation::Validate;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("Environment variable substitution failed: {0}")]
    EnvSubstitutionError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Unsupported configuration file format: {extension}")]
    UnsupportedFormat { extension: String },
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid database URL: {message}")]
    InvalidDatabaseUrl { message: String },

    #[error("Invalid pool size: {size} (must be between 1 and 100)")]
    InvalidPoolSize { size: u32 },

    #[error("Invalid {field}: {value} (must be positive)")]
    InvalidTimeout { field: &'static str, value: u64 },

    #[error("Invalid max_persist_attempts: {attempts} (must be at least 1)")]
    InvalidAttempts { attempts: u32 },

    #[error("Missing {field} (required for {mode} keys)")]
    MissingPath { field: &'static str, mode: KeyMode },

    #[error("Invalid validity_days: {days} (must be at least 1)")]
    InvalidValidity { days: u32 },

    #[error("Missing encryption_key (required for encrypted keys)")]
    MissingEncryptionKey,

    #[error("Invalid encryption_key: {message}")]
    InvalidEncryptionKey { message: String },

    #[error("Multiple validation errors: {errors:?}")]
    Multiple { errors: Vec<ValidationError> },
}
