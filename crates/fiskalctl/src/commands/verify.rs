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
use fiskal::signer::{decode_token, DecodedToken};
use fiskal::verification::{Verification, Verifier};
use serde_json::json;

use super::{open_context, read_token};
use crate::cli::{Cli, OutputFormat};
use crate::logging::should_print;

pub async fn verify_token(token: &str, format: OutputFormat, cli: &Cli) -> Result<()> {
    let token = read_token(token)?;
    let context = open_context(cli).await?;
    let verifier = Verifier::new(context.store, context.keys);

    let outcome = verifier.inspect(&token).await;

    if should_print(cli) {
        match format {
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&verification_json(&outcome))
                    .context("Failed to serialize verification result")?
            ),
            OutputFormat::Human => print_verification(&outcome),
        }
    }

    if !outcome.is_valid() {
        bail!("Token is not a valid fiscal signature");
    }
    Ok(())
}

fn verification_json(outcome: &Verification) -> serde_json::Value {
    match outcome {
        Verification::Recorded(record) | Verification::Invalidated(record) => json!({
            "valid": outcome.is_valid(),
            "tier": outcome.tier(),
            "register_id": record.register_id,
            "document_reference": record.document_reference,
            "chain_position": record.chain_position,
            "validation_error": record.validation_error,
        }),
        Verification::Cryptographic { register_id } => json!({
            "valid": true,
            "tier": outcome.tier(),
            "register_id": register_id,
        }),
        Verification::Rejected(reason) => json!({
            "valid": false,
            "tier": outcome.tier(),
            "reason": reason,
        }),
    }
}

fn print_verification(outcome: &Verification) {
    match outcome {
        Verification::Recorded(record) => {
            println!("Valid (recorded in ledger)");
            println!("  Register: {}", record.register_id);
            println!("  Document: {}", record.document_reference);
            println!("  Position: {}", record.chain_position);
        }
        Verification::Invalidated(record) => {
            println!("Invalid (marked invalid in ledger)");
            println!("  Register: {}", record.register_id);
            println!("  Document: {}", record.document_reference);
            println!(
                "  Reason: {}",
                record.validation_error.as_deref().unwrap_or("not recorded")
            );
        }
        Verification::Cryptographic { register_id } => {
            println!("Valid (signature matches the current key, not recorded in ledger)");
            println!("  Register: {}", register_id);
        }
        Verification::Rejected(reason) => println!("Invalid: {}", reason),
    }
}

pub fn decode(token: &str, format: OutputFormat, cli: &Cli) -> Result<()> {
    let token = read_token(token)?;
    let decoded = decode_token(&token).context("Failed to decode token")?;

    if !should_print(cli) {
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "header": decoded.header,
                "payload": decoded.payload,
            }))
            .context("Failed to serialize token")?
        ),
        OutputFormat::Human => print_decoded(&decoded),
    }

    Ok(())
}

fn print_decoded(decoded: &DecodedToken) {
    let payload = &decoded.payload;
    println!("Header:");
    println!("  Algorithm: {}", decoded.header.alg);
    println!("  Certificate serial: {}", decoded.header.kid);
    println!();
    println!("Payload:");
    println!("  Register: {}", payload.register_id);
    println!("  Document: {} ({})", payload.document_number, payload.document_type);
    println!("  Date: {} {}", payload.date, payload.time);
    println!("  Amount: {}", payload.amount);
    if let Some(count) = payload.transaction_count {
        println!("  Transactions: {}", count);
    }
    if payload.previous_signature.is_empty() {
        println!("  Previous signature: (first in chain)");
    } else {
        println!("  Previous signature: {}", payload.previous_signature);
    }
    for (rate, entry) in &payload.tax_details {
        println!("  Tax {}%: net {} tax {} gross {}", rate, entry.net, entry.tax, entry.gross);
    }
}
