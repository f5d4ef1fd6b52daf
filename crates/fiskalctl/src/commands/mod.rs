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

pub mod audit;
pub mod cert;
pub mod keygen;
pub mod verify;

use crate::cli::Cli;
use anyhow::{Context, Result};
use fiskal::config::{ConfigLoader, FiscalConfig};
use fiskal::database::Database;
use fiskal::keys::KeyMaterialProvider;
use fiskal::store::DbSignatureStore;
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

/// Ledger and key material resolved from configuration.
pub(crate) struct LedgerContext {
    pub store: Arc<DbSignatureStore>,
    pub keys: Arc<dyn KeyMaterialProvider>,
}

pub(crate) fn load_config(cli: &Cli) -> Result<FiscalConfig> {
    ConfigLoader::new()
        .load_config(cli.config.as_deref())
        .context("Failed to load configuration")
}

pub(crate) async fn open_context(cli: &Cli) -> Result<LedgerContext> {
    let config = load_config(cli)?;

    let database = Database::with_pool_timeout(
        &config.database.url,
        config.database.pool_size,
        config.database.pool_timeout(),
    )
        .with_context(|| format!("Failed to open ledger at {}", config.database.url))?;
    database
        .run_migrations()
        .await
        .context("Failed to prepare ledger schema")?;

    let keys = config
        .keys
        .build_provider()
        .context("Failed to load key material")?;
    debug!(
        database = %config.database.url,
        key_mode = %config.keys.mode,
        provider = keys.provider_kind(),
        "Ledger context opened"
    );

    Ok(LedgerContext {
        store: Arc::new(DbSignatureStore::new(database)),
        keys,
    })
}

/// Returns `token`, reading it from stdin when it is `-`.
pub(crate) fn read_token(token: &str) -> Result<String> {
    if token != "-" {
        return Ok(token.trim().to_string());
    }
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read token from stdin")?;
    Ok(buffer.trim().to_string())
}
