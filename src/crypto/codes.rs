// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Random tokens and short codes.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, Rng, RngCore};

/// Link token entropy in bytes (256 bits).
pub const LINK_TOKEN_BYTES: usize = 32;

/// Number of digits in OTP and verification codes.
pub const CODE_DIGITS: usize = 6;

/// Unguessable URL-safe share-link token.
pub fn link_token() -> String {
    let mut bytes = [0u8; LINK_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Uniform 6-digit code, zero-padded (`000000`..=`999999`).
pub fn otp_code() -> String {
    format!("{:06}", OsRng.gen_range(0..1_000_000u32))
}

/// 6-digit code attached to a decoy attempt so the owner can correlate
/// an alert with the audit trail. Never starts with zero.
pub fn verification_code() -> String {
    OsRng.gen_range(100_000..1_000_000u32).to_string()
}

/// Constant-time equality for short secrets.
pub fn codes_match(expected: &str, submitted: &str) -> bool {
    let (a, b) = (expected.as_bytes(), submitted.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Mask a contact address as its first three characters followed by
/// `***@domain`.
pub fn mask_contact(contact: &str) -> String {
    match contact.split_once('@') {
        Some((local, domain)) => {
            let head: String = local.chars().take(3).collect();
            format!("{head}***@{domain}")
        }
        None => {
            let head: String = contact.chars().take(3).collect();
            format!("{head}***")
        }
    }
}

/// Short prefix of a token that is safe to put in logs.
pub fn token_prefix(token: &str) -> &str {
    match token.char_indices().nth(8) {
        Some((idx, _)) => &token[..idx],
        None => token,
    }
}
