// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Cryptography
//!
//! - [`vault`]: XChaCha20-Poly1305 sealing of payloads and per-asset data keys
//! - [`password`]: Argon2id hashing of share-link passwords
//! - [`codes`]: link tokens, OTP and verification codes, masking helpers
//!
//! Nothing in this module makes policy decisions.

pub mod codes;
pub mod password;
pub mod vault;

pub use password::{hash_password, verify_password};
pub use vault::{SecretKey, Vault, VaultError};
