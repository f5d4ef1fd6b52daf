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

use anyhow::{bail, Context, Result};
use fiskal::keys::{parse_encryption_key, KeyMaterialProvider, SoftwareKeyProvider};
use std::path::Path;
use tracing::info;

use crate::cli::Cli;
use crate::logging::should_print;

pub const KEY_FILE: &str = "signing.key.pem";
pub const ENCRYPTED_KEY_FILE: &str = "signing.key.enc";
pub const CERTIFICATE_FILE: &str = "signing.crt.pem";

/// Writes a fresh key pair into `out_dir`.
///
/// With an `encryption_key` the private key is stored AES-256-GCM encrypted
/// as `signing.key.enc`, loadable with `mode = "encrypted"`.
pub fn generate_keys(
    out_dir: &Path,
    common_name: &str,
    validity_days: u32,
    force: bool,
    encryption_key: Option<&str>,
    cli: &Cli,
) -> Result<()> {
    let encryption_key = encryption_key
        .map(parse_encryption_key)
        .transpose()
        .context("Invalid --encryption-key")?;
    let key_path = match encryption_key {
        Some(_) => out_dir.join(ENCRYPTED_KEY_FILE),
        None => out_dir.join(KEY_FILE),
    };
    let certificate_path = out_dir.join(CERTIFICATE_FILE);

    if !force && (key_path.exists() || certificate_path.exists()) {
        bail!(
            "Key material already exists in {} (use --force to overwrite)",
            out_dir.display()
        );
    }

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let provider = SoftwareKeyProvider::emulated(common_name, validity_days)
        .context("Failed to generate key material")?;
    let written = match &encryption_key {
        Some(encryption_key) => {
            provider.write_encrypted_files(&key_path, &certificate_path, encryption_key)
        }
        None => provider.write_pem_files(&key_path, &certificate_path),
    };
    written.context("Failed to write key material")?;
    restrict_permissions(&key_path)?;
    info!(
        out_dir = %out_dir.display(),
        fingerprint = %provider.fingerprint(),
        encrypted = encryption_key.is_some(),
        "Wrote emulated key material"
    );

    if should_print(cli) {
        println!("Generated emulated key material:");
        println!("  Private key: {}", key_path.display());
        println!("  Certificate: {}", certificate_path.display());
        println!("  Serial: {}", provider.certificate_serial_number()?);
        println!("  Fingerprint: {}", provider.fingerprint());
    }

    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to restrict permissions of {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
