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

//! Diesel schema for the signature ledger.
//!
//! Column types are restricted to `Text`, `BigInt` and `Bool` so the same
//! definition serves SQLite and PostgreSQL.

diesel::table! {
    signature_records (id) {
        id -> Text,
        signature_value -> Text,
        register_id -> Text,
        document_reference -> Text,
        document_type -> Text,
        amount_cents -> BigInt,
        certificate_serial_number -> Text,
        chain_position -> BigInt,
        created_at -> Text,
        is_valid -> Bool,
        validation_error -> Nullable<Text>,
    }
}
