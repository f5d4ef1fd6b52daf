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

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod logging;

use cli::{CertCommands, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(&cli)?;

    match &cli.command {
        Commands::Keygen {
            out_dir,
            common_name,
            validity_days,
            force,
            encryption_key,
        } => commands::keygen::generate_keys(
            out_dir,
            common_name,
            *validity_days,
            *force,
            encryption_key.as_deref(),
            &cli,
        )?,
        Commands::Cert(CertCommands::Inspect { path, format }) => {
            commands::cert::inspect_certificate(path, *format, &cli)?
        }
        Commands::Verify { token, format } => {
            commands::verify::verify_token(token, *format, &cli).await?
        }
        Commands::Decode { token, format } => commands::verify::decode(token, *format, &cli)?,
        Commands::Audit {
            register,
            verify_signatures,
            format,
        } => commands::audit::audit_chain(register, *verify_signatures, *format, &cli).await?,
    }

    Ok(())
}
