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

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fiskalctl",
    version,
    about = "Command-line interface for fiskal signature chains",
    long_about = "A tool for generating emulated key material, inspecting certificates, and verifying and auditing fiscal signature chains"
)]
pub struct Cli {
    /// Configuration file (defaults to FISKAL_CONFIG, ./fiskal.toml, then the user and system config dirs)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate an emulated signing key and self-signed certificate
    Keygen {
        /// Directory to write the key and signing.crt.pem into
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Certificate subject common name
        #[arg(long, default_value = "Fiskal Emulated Register")]
        common_name: String,

        /// Certificate validity in days
        #[arg(long, default_value_t = 365)]
        validity_days: u32,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,

        /// 64-hex master key; stores the private key encrypted as signing.key.enc
        #[arg(long, env = "FISKAL_KEY_ENCRYPTION_KEY", hide_env_values = true)]
        encryption_key: Option<String>,
    },

    /// Certificate operations
    #[command(subcommand)]
    Cert(CertCommands),

    /// Verify a token against the configured ledger and key
    Verify {
        /// Compact token, or "-" to read it from stdin
        token: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
    },

    /// Decode a token and print its header and payload without verifying it
    Decode {
        /// Compact token, or "-" to read it from stdin
        token: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
    },

    /// Audit the stored chain of a register
    Audit {
        /// Register id
        #[arg(short, long)]
        register: String,

        /// Also check every signature against the current key
        #[arg(long)]
        verify_signatures: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
    },
}

#[derive(Subcommand, Debug)]
pub enum CertCommands {
    /// Print serial number and validity of a PEM or DER certificate
    Inspect {
        path: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_audit_arguments() {
        let cli = Cli::try_parse_from([
            "fiskalctl",
            "--config",
            "/etc/fiskal/config.toml",
            "audit",
            "--register",
            "R1",
            "--verify-signatures",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/etc/fiskal/config.toml")));
        match cli.command {
            Commands::Audit {
                register,
                verify_signatures,
                format,
            } => {
                assert_eq!(register, "R1");
                assert!(verify_signatures);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
