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
use chrono::Utc;
use fiskal::certificate::{parse_certificate, CertificateInfo};
use std::path::Path;

use crate::cli::{Cli, OutputFormat};
use crate::logging::should_print;

pub fn inspect_certificate(path: &Path, format: OutputFormat, cli: &Cli) -> Result<()> {
    if !path.is_file() {
        bail!("Certificate file does not exist: {}", path.display());
    }

    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let info = parse_certificate(&bytes).context("Failed to parse certificate")?;

    if !should_print(cli) {
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&info).context("Failed to serialize certificate info")?
        ),
        OutputFormat::Human => print_human(&info, path),
    }

    Ok(())
}

fn print_human(info: &CertificateInfo, path: &Path) {
    println!("Certificate: {}", path.display());
    println!("  Subject: {}", info.subject);
    println!("  Serial: {}", info.serial_number);
    println!("  Valid from: {}", info.valid_from.to_rfc3339());
    println!("  Valid until: {}", info.valid_until.to_rfc3339());
    println!("  Status: {}", info.status_at(Utc::now()));
}
