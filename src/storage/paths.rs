// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the on-disk data layout.

use std::path::{Path, PathBuf};

use crate::models::PayloadClass;

/// Default base directory for all persistent data.
pub const DATA_ROOT: &str = "./data";

/// File name of the embedded record database.
pub const DATABASE_FILE: &str = "share.redb";

/// File name of the generated master key (hex) when none is configured.
pub const MASTER_KEY_FILE: &str = "master.key";

/// Storage path utilities for the data directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the redb database file.
    pub fn database(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    /// Path to the generated master key file.
    pub fn master_key(&self) -> PathBuf {
        self.root.join(MASTER_KEY_FILE)
    }

    // ========== Blob Paths ==========

    /// Directory containing every file asset's encrypted blobs.
    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join("blobs")
    }

    /// Directory for one file asset.
    pub fn blob_dir(&self, file_id: &str) -> PathBuf {
        self.blobs_dir().join(file_id)
    }

    /// Path to the sealed payload of the given class.
    pub fn blob(&self, file_id: &str, class: PayloadClass) -> PathBuf {
        self.blob_dir(file_id).join(format!("{}.bin", class.as_str()))
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}
