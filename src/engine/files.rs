// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File asset catalog: upload, listing, owner download, deletion.
//!
//! Payloads are sealed with a fresh per-asset data key before they touch
//! disk. Sealing and opening run on the blocking pool.

use std::sync::Arc;

use tracing::{error, info};

use crate::clock::Clock;
use crate::crypto::vault::{self, payload_aad, SecretKey, Vault};
use crate::crypto::VaultError;
use crate::models::{FileAsset, PayloadClass};
use crate::storage::{BlobStorage, ShareDatabase};

use super::error::{EngineError, EngineResult};

/// Longest accepted filename, in characters.
pub const MAX_FILENAME_CHARS: usize = 255;

/// One uploaded payload before sealing.
#[derive(Debug, Clone)]
pub struct NewPayload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Decrypted payload ready to be returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub class: PayloadClass,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Reduce a client-supplied filename to its last path segment.
pub fn sanitize_filename(raw: &str) -> EngineResult<String> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>();

    if name.is_empty() || name == "." || name == ".." {
        return Err(EngineError::InvalidParameter(
            "filename must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_FILENAME_CHARS {
        return Err(EngineError::InvalidParameter(format!(
            "filename longer than {MAX_FILENAME_CHARS} characters"
        )));
    }
    Ok(name)
}

#[derive(Clone)]
pub struct FileCatalog {
    db: Arc<ShareDatabase>,
    blobs: BlobStorage,
    vault: Arc<Vault>,
    clock: Arc<dyn Clock>,
}

impl FileCatalog {
    pub fn new(
        db: Arc<ShareDatabase>,
        blobs: BlobStorage,
        vault: Arc<Vault>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            blobs,
            vault,
            clock,
        }
    }

    /// Seal and store a real payload and its decoy as a new asset.
    pub async fn upload(
        &self,
        owner_id: &str,
        owner_contact: Option<&str>,
        real: NewPayload,
        decoy: NewPayload,
    ) -> EngineResult<FileAsset> {
        let filename = sanitize_filename(&real.filename)?;
        let decoy_filename = sanitize_filename(&decoy.filename)?;

        let file_id = uuid::Uuid::new_v4().to_string();
        let size = real.bytes.len() as u64;
        let decoy_size = decoy.bytes.len() as u64;

        let blobs = self.blobs.clone();
        let vault = self.vault.clone();
        let id = file_id.clone();
        let wrapped_key = tokio::task::spawn_blocking(move || -> EngineResult<String> {
            let data_key = SecretKey::generate();
            for (class, payload) in [(PayloadClass::Real, &real), (PayloadClass::Decoy, &decoy)] {
                let sealed =
                    vault::encrypt(&payload.bytes, &data_key, &payload_aad(&id, class.as_str()))?;
                blobs.write_blob(&id, class, &sealed)?;
            }
            let wrapped = vault.wrap_key(&data_key, &id)?;
            Ok(hex::encode(wrapped))
        })
        .await?;

        let wrapped_key = match wrapped_key {
            Ok(key) => key,
            Err(e) => {
                self.discard_blobs(&file_id);
                return Err(e);
            }
        };

        let asset = FileAsset {
            id: file_id.clone(),
            owner_id: owner_id.to_string(),
            owner_contact: owner_contact.map(str::to_string),
            filename,
            decoy_filename,
            size,
            decoy_size,
            uploaded_at: self.clock.now(),
            wrapped_key,
        };

        if let Err(e) = self.db.insert_file(&asset) {
            self.discard_blobs(&file_id);
            return Err(e.into());
        }

        info!(file_id = %asset.id, owner_id = %owner_id, size, decoy_size, "File asset stored");
        Ok(asset)
    }

    /// Asset lookup without ownership check.
    pub fn asset(&self, file_id: &str) -> EngineResult<FileAsset> {
        self.db
            .get_file(file_id)?
            .ok_or(EngineError::NotFound("file"))
    }

    /// Asset lookup that hides other owners' assets as not found.
    pub fn get_owned(&self, owner_id: &str, file_id: &str) -> EngineResult<FileAsset> {
        match self.db.get_file(file_id)? {
            Some(asset) if asset.owner_id == owner_id => Ok(asset),
            _ => Err(EngineError::NotFound("file")),
        }
    }

    pub fn list(&self, owner_id: &str) -> EngineResult<Vec<FileAsset>> {
        Ok(self.db.list_files_for_owner(owner_id)?)
    }

    /// Owner download; always the real payload.
    pub async fn download_real(&self, owner_id: &str, file_id: &str) -> EngineResult<Payload> {
        let asset = self.get_owned(owner_id, file_id)?;
        self.read_payload(&asset, PayloadClass::Real).await
    }

    /// Delete an asset, deactivate its links, then remove its blobs.
    ///
    /// Returns the number of links that were deactivated.
    pub fn delete(&self, owner_id: &str, file_id: &str) -> EngineResult<usize> {
        self.get_owned(owner_id, file_id)?;

        let (_, deactivated) = self
            .db
            .delete_file(file_id)?
            .ok_or(EngineError::NotFound("file"))?;

        self.blobs.delete_asset(file_id)?;
        info!(file_id = %file_id, owner_id = %owner_id, deactivated, "File asset deleted");
        Ok(deactivated)
    }

    /// Open one blob of an asset.
    pub async fn read_payload(&self, asset: &FileAsset, class: PayloadClass) -> EngineResult<Payload> {
        let blobs = self.blobs.clone();
        let vault = self.vault.clone();
        let file_id = asset.id.clone();
        let wrapped_hex = asset.wrapped_key.clone();

        let bytes = tokio::task::spawn_blocking(move || -> EngineResult<Vec<u8>> {
            let sealed = blobs.read_blob(&file_id, class)?;
            let wrapped = hex::decode(&wrapped_hex).map_err(|_| VaultError::Decryption)?;
            let data_key = vault.unwrap_key(&wrapped, &file_id)?;
            Ok(vault::decrypt(
                &sealed,
                &data_key,
                &payload_aad(&file_id, class.as_str()),
            )?)
        })
        .await??;

        Ok(Payload {
            class,
            filename: asset.filename_for(class).to_string(),
            bytes,
        })
    }

    fn discard_blobs(&self, file_id: &str) {
        if let Err(e) = self.blobs.delete_asset(file_id) {
            error!(file_id = %file_id, error = %e, "Failed to remove blobs of aborted upload");
        }
    }
}
