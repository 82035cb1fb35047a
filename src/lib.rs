// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decoy Share Gate - deception-aware file sharing
//!
//! Owners upload a sensitive file together with a decoy and hand out
//! password-protected, time- and count-limited share links. The right
//! password yields the real file; a wrong one silently yields the decoy
//! while the owner is alerted.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Bearer token verification for owners
//! - `engine` - Link registry, OTP authority, verifier, resolver, audit log
//! - `crypto` - Payload sealing, password hashing, token and code generation
//! - `notify` - Pluggable owner notification channel
//! - `storage` - Encrypted blobs, record database, operational audit log

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod maintenance;
pub mod models;
pub mod notify;
pub mod startup;
pub mod state;
pub mod storage;
