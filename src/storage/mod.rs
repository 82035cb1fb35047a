// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Durable state of the share gate, split in three stores:
//!
//! - **Blob storage**: sealed payloads on the filesystem, already encrypted
//!   by the vault before they get here
//! - **Record database**: redb tables for assets, links, OTP challenges,
//!   access attempts and owner actions
//! - **Audit log**: daily JSONL files of owner operations and side-channel events
//!
//! ## Storage Layout
//!
//! ```text
//! $DATA_DIR/
//!   share.redb                  # Record database
//!   master.key                  # Generated master key (if none configured)
//!   blobs/{file_id}/
//!     real.bin                  # Sealed real payload
//!     decoy.bin                 # Sealed decoy payload
//!   audit/
//!     {date}/events.jsonl       # Daily audit logs
//! ```

pub mod audit;
pub mod blobs;
pub mod database;
pub mod paths;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use blobs::{BlobStorage, StorageError, StorageResult};
pub use database::{BlockResult, DatabaseError, ShareDatabase};
pub use paths::StoragePaths;
