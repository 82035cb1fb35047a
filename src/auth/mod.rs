// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Owner endpoints accept a bearer credential issued by the external account
//! service. Account registration and login live there; this server only
//! verifies tokens.
//!
//! ## Auth Flow
//!
//! 1. The owner signs in with the account service
//! 2. The client sends `Authorization: Bearer <JWT>`
//! 3. The server:
//!    - verifies the signature (JWKS or shared HS256 secret)
//!    - checks expiry, issuer and audience
//!    - maps `sub` → owner id and `email` → owner contact
//!
//! Recipients of a share link never authenticate; the access endpoints are
//! public and gated by link token, password and OTP instead.
//!
//! ## Security
//!
//! - JWKS is fetched over HTTPS and cached with a TTL
//! - Clock skew tolerance is 60 seconds
//! - Signature-less decoding exists only in test and `dev` builds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::Auth;
pub use jwks::JwksManager;
