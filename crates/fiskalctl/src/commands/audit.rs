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
use fiskal::verification::{ChainAudit, ChainAuditReport};

use super::open_context;
use crate::cli::{Cli, OutputFormat};
use crate::logging::should_print;

pub async fn audit_chain(
    register: &str,
    verify_signatures: bool,
    format: OutputFormat,
    cli: &Cli,
) -> Result<()> {
    let context = open_context(cli).await?;
    let report = ChainAudit::new(context.store, context.keys)
        .audit(register, verify_signatures)
        .await
        .with_context(|| format!("Failed to audit register {}", register))?;

    if should_print(cli) {
        match format {
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize audit report")?
            ),
            OutputFormat::Human => print_report(&report),
        }
    }

    if !report.is_intact() {
        bail!(
            "Chain of register {} has {} violation(s)",
            register,
            report.violations.len()
        );
    }
    Ok(())
}

fn print_report(report: &ChainAuditReport) {
    println!("Register: {}", report.register_id);
    println!("  Records checked: {}", report.records_checked);
    println!("  Marked invalid: {}", report.invalidated);

    if report.is_intact() {
        println!("  Chain intact");
    } else {
        println!("  Violations ({}):", report.violations.len());
        for violation in &report.violations {
            println!("    {}", violation);
        }
    }
}
