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

//! # Fiskal
//!
//! Tamper-evident fiscal signature chains for cash registers.
//!
//! Every fiscal document a register issues (invoices and daily, monthly or
//! yearly closings) is signed with ES256 and linked to the previous signature
//! of the same register. The resulting chain is append-only and must never
//! fork, even when many workers sign for the same register at once.
//!
//! ## Components
//!
//! - [`keys`]: the [`KeyMaterialProvider`](keys::KeyMaterialProvider) capability
//!   with software-emulated and hardware-backed implementations
//! - [`certificate`]: X.509 certificate inspection
//! - [`payload`]: the canonical, deterministic fiscal payload
//! - [`signer`]: compact JWS token production and decoding
//! - [`chain`]: the [`ChainCoordinator`](chain::ChainCoordinator) that serializes
//!   chain extension per register
//! - [`verification`]: two-tier token verification and chain audits
//! - [`closing`]: periodic closings as first-class chain links
//! - [`store`] and [`database`]: the persistence boundary and its
//!   in-memory and Diesel-backed implementations
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fiskal::chain::{ChainConfig, ChainCoordinator, SigningRequest};
//! use fiskal::keys::SoftwareKeyProvider;
//! use fiskal::models::Amount;
//! use fiskal::store::MemorySignatureStore;
//!
//! let keys = Arc::new(SoftwareKeyProvider::emulated("Register 1", 365)?);
//! let store = Arc::new(MemorySignatureStore::new());
//! let coordinator = ChainCoordinator::new(store, keys, ChainConfig::default());
//!
//! let request = SigningRequest::invoice("R1", "2026-000001", Amount::from_cents(1990));
//! let outcome = coordinator.append_signature(&request, "req-42").await?;
//! assert_eq!(outcome.previous_signature_used, "");
//! ```

pub mod audit;
pub mod certificate;
pub mod chain;
pub mod closing;
pub mod config;
pub mod database;
pub mod error;
pub mod keys;
pub mod models;
pub mod payload;
pub mod signer;
pub mod store;
pub mod verification;

pub use chain::{ChainConfig, ChainCoordinator, SignatureOutcome, SigningRequest};
pub use closing::{ClosingPeriod, ClosingSigner, ClosingTotals};
pub use error::ChainError;
pub use keys::{KeyError, KeyMaterialProvider};
pub use models::{Amount, DocumentType, SignatureRecord};
pub use store::{MemorySignatureStore, SignatureStore, StoreError};
pub use verification::Verifier;
