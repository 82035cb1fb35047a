// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated encryption of payloads at rest.
//!
//! Every file asset gets its own random [`SecretKey`]. Both blobs of the
//! asset are sealed with it, and the key itself is sealed under the master
//! key before it is persisted. Sealed data is laid out as
//! `nonce (24 bytes) || ciphertext || tag (16 bytes)`.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Key size (256 bits).
pub const KEY_SIZE: usize = 32;

/// Nonce size for XChaCha20-Poly1305 (192 bits).
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (128 bits).
pub const TAG_SIZE: usize = 16;

const KEY_WRAP_CONTEXT: &[u8] = b"decoy-share-gate/data-key";

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Integrity or key failure while opening sealed data.
    #[error("decryption failed")]
    Decryption,

    #[error("encryption failed")]
    Encryption,

    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

/// 256-bit symmetric key, wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_SIZE]);

impl SecretKey {
    /// Fresh random key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, VaultError> {
        let array: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            VaultError::InvalidKey(format!(
                "expected {KEY_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(hex_key: &str) -> Result<Self, VaultError> {
        let mut bytes = hex::decode(hex_key.trim())
            .map_err(|e| VaultError::InvalidKey(e.to_string()))?;
        let key = Self::from_slice(&bytes);
        bytes.zeroize();
        key
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Seal `plaintext` under `key`, binding it to `aad`.
pub fn encrypt(plaintext: &[u8], key: &SecretKey, aad: &[u8]) -> Result<Vec<u8>, VaultError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| VaultError::Encryption)?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open data produced by [`encrypt`]. Fails with [`VaultError::Decryption`]
/// on a wrong key, wrong `aad`, truncation or any tampering.
pub fn decrypt(sealed: &[u8], key: &SecretKey, aad: &[u8]) -> Result<Vec<u8>, VaultError> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(VaultError::Decryption);
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| VaultError::Decryption)
}

/// Associated data binding a blob to its asset and class.
pub fn payload_aad(file_id: &str, class: &str) -> Vec<u8> {
    format!("{file_id}:{class}").into_bytes()
}

/// Holder of the master key; wraps and unwraps per-asset data keys.
#[derive(Clone)]
pub struct Vault {
    master: SecretKey,
}

impl Vault {
    pub fn new(master: SecretKey) -> Self {
        Self { master }
    }

    /// Seal a data key for storage next to the asset record.
    pub fn wrap_key(&self, key: &SecretKey, file_id: &str) -> Result<Vec<u8>, VaultError> {
        encrypt(key.as_bytes(), &self.master, &wrap_aad(file_id))
    }

    pub fn unwrap_key(&self, wrapped: &[u8], file_id: &str) -> Result<SecretKey, VaultError> {
        let mut bytes = decrypt(wrapped, &self.master, &wrap_aad(file_id))?;
        let key = SecretKey::from_slice(&bytes).map_err(|_| VaultError::Decryption);
        bytes.zeroize();
        key
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault").finish_non_exhaustive()
    }
}

fn wrap_aad(file_id: &str) -> Vec<u8> {
    let mut aad = KEY_WRAP_CONTEXT.to_vec();
    aad.push(b':');
    aad.extend_from_slice(file_id.as_bytes());
    aad
}
