// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded record database backed by redb (pure Rust, ACID).
//!
//! Every conditional state transition (download consumption, OTP
//! consumption, blocking) runs inside a single write transaction, so
//! concurrent requests observe them as indivisible.
//!
//! ## Table Layout
//!
//! - `files`: file_id → serialized FileAsset
//! - `links`: link token → serialized ShareLink
//! - `otp_challenges`: link token → serialized OtpChallenge (one slot per link)
//! - `access_attempts`: attempt_id → serialized AccessAttempt
//! - `owner_attempt_index`: composite key (owner|!timestamp|attempt_id) → attempt_id
//! - `owner_actions`: action_id → serialized OwnerAction

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};

use crate::crypto::codes::codes_match;
use crate::models::{AccessAttempt, FileAsset, OtpChallenge, OwnerAction, ShareLink};

// =============================================================================
// Table Definitions
// =============================================================================

const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

const LINKS: TableDefinition<&str, &[u8]> = TableDefinition::new("links");

/// At most one challenge per link: issuing a new one overwrites the slot.
const OTP_CHALLENGES: TableDefinition<&str, &[u8]> = TableDefinition::new("otp_challenges");

/// Append-only; rows are never updated or removed.
const ACCESS_ATTEMPTS: TableDefinition<&str, &[u8]> = TableDefinition::new("access_attempts");

/// Index: composite key → attempt_id.
/// Key format: `len(owner)_be | owner | !timestamp_be | attempt_id` for
/// newest-first range scans.
const OWNER_ATTEMPT_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("owner_attempt_index");

const OWNER_ACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_actions");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("already exists: {0}")]
    AlreadyExists(String),
}

pub type DbResult<T> = Result<T, DatabaseError>;

/// Outcome of [`ShareDatabase::block_link`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockResult {
    /// The link was active or merely unusable and is now blocked.
    Blocked(ShareLink),
    /// The link had already been blocked; nothing changed.
    AlreadyBlocked(ShareLink),
}

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Length-prefixed owner id, so ids containing separators cannot collide.
fn owner_prefix(owner_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(4 + owner_id.len());
    prefix.extend_from_slice(&(owner_id.len() as u32).to_be_bytes());
    prefix.extend_from_slice(owner_id.as_bytes());
    prefix
}

/// Build a composite key for the owner_attempt_index table.
///
/// The inverted timestamp ensures newest-first ordering when scanning forward.
fn make_index_key(owner_id: &str, at: DateTime<Utc>, attempt_id: &str) -> Vec<u8> {
    let mut key = owner_prefix(owner_id);
    key.extend_from_slice(&(!at.timestamp_micros() as u64).to_be_bytes());
    key.extend_from_slice(attempt_id.as_bytes());
    key
}

/// Write an attempt and its owner index entry inside `write_txn`.
fn insert_attempt(write_txn: &WriteTransaction, attempt: &AccessAttempt) -> DbResult<()> {
    let json = serde_json::to_vec(attempt)?;
    let key = make_index_key(&attempt.owner_id, attempt.attempted_at, &attempt.id);

    let mut table = write_txn.open_table(ACCESS_ATTEMPTS)?;
    if table.get(attempt.id.as_str())?.is_some() {
        return Err(DatabaseError::AlreadyExists(format!(
            "attempt {}",
            attempt.id
        )));
    }
    table.insert(attempt.id.as_str(), json.as_slice())?;

    let mut idx_table = write_txn.open_table(OWNER_ATTEMPT_INDEX)?;
    idx_table.insert(key.as_slice(), attempt.id.as_str())?;
    Ok(())
}

// =============================================================================
// ShareDatabase
// =============================================================================

/// Embedded ACID record store.
pub struct ShareDatabase {
    db: Database,
}

impl std::fmt::Debug for ShareDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareDatabase").finish_non_exhaustive()
    }
}

impl ShareDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(FILES)?;
            let _ = write_txn.open_table(LINKS)?;
            let _ = write_txn.open_table(OTP_CHALLENGES)?;
            let _ = write_txn.open_table(ACCESS_ATTEMPTS)?;
            let _ = write_txn.open_table(OWNER_ATTEMPT_INDEX)?;
            let _ = write_txn.open_table(OWNER_ACTIONS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Cheap read used by readiness probes.
    pub fn health_check(&self) -> DbResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(FILES)?;
        Ok(())
    }

    // =========================================================================
    // File Assets
    // =========================================================================

    pub fn insert_file(&self, file: &FileAsset) -> DbResult<()> {
        let json = serde_json::to_vec(file)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(FILES)?;
            if table.get(file.id.as_str())?.is_some() {
                return Err(DatabaseError::AlreadyExists(format!("file {}", file.id)));
            }
            table.insert(file.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_file(&self, file_id: &str) -> DbResult<Option<FileAsset>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FILES)?;
        match table.get(file_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All assets of an owner, newest upload first.
    pub fn list_files_for_owner(&self, owner_id: &str) -> DbResult<Vec<FileAsset>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        let mut files = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let file: FileAsset = serde_json::from_slice(value.value())?;
            if file.owner_id == owner_id {
                files.push(file);
            }
        }
        files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(files)
    }

    /// Remove an asset record and deactivate every link pointing to it.
    ///
    /// Returns the removed asset and the number of links deactivated.
    pub fn delete_file(&self, file_id: &str) -> DbResult<Option<(FileAsset, usize)>> {
        let write_txn = self.db.begin_write()?;
        let result = {
            let mut files = write_txn.open_table(FILES)?;
            let removed = match files.remove(file_id)? {
                Some(value) => Some(serde_json::from_slice::<FileAsset>(value.value())?),
                None => None,
            };

            match removed {
                Some(file) => {
                    let mut links = write_txn.open_table(LINKS)?;
                    let mut otps = write_txn.open_table(OTP_CHALLENGES)?;

                    let mut to_update = Vec::new();
                    for entry in links.iter()? {
                        let (_, value) = entry?;
                        let link: ShareLink = serde_json::from_slice(value.value())?;
                        if link.file_id == file_id && link.active {
                            to_update.push(link);
                        }
                    }

                    let count = to_update.len();
                    for mut link in to_update {
                        link.active = false;
                        let json = serde_json::to_vec(&link)?;
                        links.insert(link.token.as_str(), json.as_slice())?;
                        otps.remove(link.token.as_str())?;
                    }
                    Some((file, count))
                }
                None => None,
            }
        };
        write_txn.commit()?;
        Ok(result)
    }

    // =========================================================================
    // Share Links
    // =========================================================================

    /// Insert a new link. Fails with `AlreadyExists` if the token is taken,
    /// so a token is never reused.
    pub fn insert_link(&self, link: &ShareLink) -> DbResult<()> {
        let json = serde_json::to_vec(link)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(LINKS)?;
            if table.get(link.token.as_str())?.is_some() {
                return Err(DatabaseError::AlreadyExists("link token".to_string()));
            }
            table.insert(link.token.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_link(&self, token: &str) -> DbResult<Option<ShareLink>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LINKS)?;
        match table.get(token)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Atomically consume one download unit and append the attempt that
    /// earned it.
    ///
    /// Succeeds only if the link is usable at the attempt's timestamp. The
    /// counter increment, the deactivation at the limit and the attempt
    /// write share one transaction, so an attempt that cannot be recorded
    /// costs no download. Returns the updated link, or `None` (with nothing
    /// written) if the link is missing or unusable.
    pub fn consume_download_and_record(
        &self,
        attempt: &AccessAttempt,
    ) -> DbResult<Option<ShareLink>> {
        let token = attempt.link_token.as_str();
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(LINKS)?;

            let existing_bytes = match table.get(token)? {
                Some(value) => value.value().to_vec(),
                None => return Ok(None),
            };

            let mut link: ShareLink = serde_json::from_slice(&existing_bytes)?;
            if !link.is_usable(attempt.attempted_at) {
                return Ok(None);
            }

            link.downloads_consumed += 1;
            if link.downloads_consumed >= link.download_limit {
                link.active = false;
            }

            let json = serde_json::to_vec(&link)?;
            table.insert(token, json.as_slice())?;
            drop(table);

            insert_attempt(&write_txn, attempt)?;
            link
        };
        write_txn.commit()?;
        Ok(Some(updated))
    }

    /// Irreversibly block a link and persist the owner action that did it,
    /// in one transaction. A second block changes nothing and records
    /// nothing.
    pub fn block_link(&self, token: &str, action: &OwnerAction) -> DbResult<Option<BlockResult>> {
        let write_txn = self.db.begin_write()?;
        let result = {
            let mut links = write_txn.open_table(LINKS)?;

            let existing_bytes = match links.get(token)? {
                Some(value) => value.value().to_vec(),
                None => return Ok(None),
            };

            let mut link: ShareLink = serde_json::from_slice(&existing_bytes)?;
            if link.blocked {
                return Ok(Some(BlockResult::AlreadyBlocked(link)));
            }

            link.active = false;
            link.blocked = true;
            let json = serde_json::to_vec(&link)?;
            links.insert(token, json.as_slice())?;

            let mut otps = write_txn.open_table(OTP_CHALLENGES)?;
            otps.remove(token)?;

            let mut actions = write_txn.open_table(OWNER_ACTIONS)?;
            let action_json = serde_json::to_vec(action)?;
            actions.insert(action.id.as_str(), action_json.as_slice())?;

            BlockResult::Blocked(link)
        };
        write_txn.commit()?;
        Ok(Some(result))
    }

    /// All links of an owner, newest first.
    pub fn list_links_for_owner(&self, owner_id: &str) -> DbResult<Vec<ShareLink>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LINKS)?;

        let mut links = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let link: ShareLink = serde_json::from_slice(value.value())?;
            if link.owner_id == owner_id {
                links.push(link);
            }
        }
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(links)
    }

    /// Flip `active` off for links whose expiry has passed.
    pub fn deactivate_expired_links(&self, now: DateTime<Utc>) -> DbResult<usize> {
        let write_txn = self.db.begin_write()?;
        let count = {
            let mut table = write_txn.open_table(LINKS)?;

            let mut expired = Vec::new();
            for entry in table.iter()? {
                let (_, value) = entry?;
                let link: ShareLink = serde_json::from_slice(value.value())?;
                if link.active && now >= link.expires_at {
                    expired.push(link);
                }
            }

            for link in &mut expired {
                link.active = false;
                let json = serde_json::to_vec(&*link)?;
                table.insert(link.token.as_str(), json.as_slice())?;
            }
            expired.len()
        };
        write_txn.commit()?;
        Ok(count)
    }

    // =========================================================================
    // OTP Challenges
    // =========================================================================

    /// Store a challenge, replacing any prior one for the same link.
    pub fn replace_otp(&self, challenge: &OtpChallenge) -> DbResult<()> {
        let json = serde_json::to_vec(challenge)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(OTP_CHALLENGES)?;
            table.insert(challenge.link_token.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Check a submitted code and consume the challenge in one step.
    ///
    /// Any attempt removes the challenge, so a code verifies at most once
    /// and a wrong guess burns it. Returns `true` only for a live, matching
    /// code.
    pub fn consume_otp(&self, token: &str, submitted: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let write_txn = self.db.begin_write()?;
        let verified = {
            let mut table = write_txn.open_table(OTP_CHALLENGES)?;
            let challenge: OtpChallenge = match table.remove(token)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Ok(false),
            };
            challenge.is_live(now) && codes_match(&challenge.code, submitted)
        };
        write_txn.commit()?;
        Ok(verified)
    }

    /// Remove challenges that can no longer verify.
    pub fn purge_expired_otps(&self, now: DateTime<Utc>) -> DbResult<usize> {
        let write_txn = self.db.begin_write()?;
        let count = {
            let mut table = write_txn.open_table(OTP_CHALLENGES)?;

            let mut stale = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                let challenge: OtpChallenge = serde_json::from_slice(value.value())?;
                if !challenge.is_live(now) {
                    stale.push(key.value().to_string());
                }
            }

            for token in &stale {
                table.remove(token.as_str())?;
            }
            stale.len()
        };
        write_txn.commit()?;
        Ok(count)
    }

    // =========================================================================
    // Access Attempts
    // =========================================================================

    /// Append an attempt and its owner index entry.
    pub fn append_attempt(&self, attempt: &AccessAttempt) -> DbResult<()> {
        let write_txn = self.db.begin_write()?;
        insert_attempt(&write_txn, attempt)?;
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_attempt(&self, attempt_id: &str) -> DbResult<Option<AccessAttempt>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCESS_ATTEMPTS)?;
        match table.get(attempt_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Attempts against an owner's links, newest first.
    pub fn list_attempts_for_owner(&self, owner_id: &str) -> DbResult<Vec<AccessAttempt>> {
        let read_txn = self.db.begin_read()?;
        let idx_table = read_txn.open_table(OWNER_ATTEMPT_INDEX)?;
        let table = read_txn.open_table(ACCESS_ATTEMPTS)?;

        let prefix = owner_prefix(owner_id);
        let mut attempts = Vec::new();

        for entry in idx_table.range(prefix.as_slice()..)? {
            let (key, value) = entry?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            if let Some(row) = table.get(value.value())? {
                attempts.push(serde_json::from_slice(row.value())?);
            }
        }

        Ok(attempts)
    }

    // =========================================================================
    // Owner Actions
    // =========================================================================

    /// Owner actions applied to a link, oldest first.
    pub fn owner_actions_for_link(&self, token: &str) -> DbResult<Vec<OwnerAction>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OWNER_ACTIONS)?;

        let mut actions = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let action: OwnerAction = serde_json::from_slice(value.value())?;
            if action.link_token == token {
                actions.push(action);
            }
        }
        actions.sort_by(|a, b| a.performed_at.cmp(&b.performed_at));
        Ok(actions)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionTarget, OwnerActionKind, ServedPayload};
    use chrono::TimeDelta;
    use std::sync::Arc;

    fn temp_db() -> (ShareDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = ShareDatabase::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    fn sample_link(token: &str, now: DateTime<Utc>, limit: u32) -> ShareLink {
        ShareLink {
            token: token.to_string(),
            file_id: "f1".to_string(),
            owner_id: "owner-1".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            created_at: now,
            expires_at: now + TimeDelta::hours(24),
            download_limit: limit,
            downloads_consumed: 0,
            active: true,
            blocked: false,
        }
    }

    fn sample_file(id: &str, owner: &str, at: DateTime<Utc>) -> FileAsset {
        FileAsset {
            id: id.to_string(),
            owner_id: owner.to_string(),
            owner_contact: None,
            filename: "report.pdf".to_string(),
            decoy_filename: "report-old.pdf".to_string(),
            size: 10,
            decoy_size: 9,
            uploaded_at: at,
            wrapped_key: "00".to_string(),
        }
    }

    fn sample_attempt(id: &str, owner: &str, at: DateTime<Utc>) -> AccessAttempt {
        AccessAttempt {
            id: id.to_string(),
            link_token: "tok".to_string(),
            file_id: "f1".to_string(),
            filename: "report.pdf".to_string(),
            owner_id: owner.to_string(),
            attempted_at: at,
            password_correct: Some(false),
            file_type_served: ServedPayload::Decoy,
            ip_address: "10.0.0.1".to_string(),
            verification_code: Some("123456".to_string()),
            otp_verified: None,
        }
    }

    fn block_action(token: &str, now: DateTime<Utc>) -> OwnerAction {
        OwnerAction {
            id: uuid::Uuid::new_v4().to_string(),
            target: ActionTarget::Link {
                link_token: token.to_string(),
            },
            link_token: token.to_string(),
            action: OwnerActionKind::Block,
            actor: "owner-1".to_string(),
            performed_at: now,
        }
    }

    #[test]
    fn insert_and_get_link() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        db.insert_link(&sample_link("tok", now, 2)).unwrap();

        let link = db.get_link("tok").unwrap().unwrap();
        assert_eq!(link.download_limit, 2);
        assert!(db.get_link("missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_token_is_rejected() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        db.insert_link(&sample_link("tok", now, 2)).unwrap();
        let result = db.insert_link(&sample_link("tok", now, 5));
        assert!(matches!(result, Err(DatabaseError::AlreadyExists(_))));
        assert_eq!(db.get_link("tok").unwrap().unwrap().download_limit, 2);
    }

    fn download_attempt(id: &str, at: DateTime<Utc>) -> AccessAttempt {
        AccessAttempt {
            password_correct: Some(true),
            file_type_served: ServedPayload::Real,
            verification_code: None,
            ..sample_attempt(id, "owner-1", at)
        }
    }

    #[test]
    fn consume_download_deactivates_at_limit() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        db.insert_link(&sample_link("tok", now, 2)).unwrap();

        let first = db
            .consume_download_and_record(&download_attempt("a1", now))
            .unwrap()
            .unwrap();
        assert_eq!(first.downloads_consumed, 1);
        assert!(first.active);

        let second = db
            .consume_download_and_record(&download_attempt("a2", now))
            .unwrap()
            .unwrap();
        assert_eq!(second.downloads_consumed, 2);
        assert!(!second.active);

        assert!(db
            .consume_download_and_record(&download_attempt("a3", now))
            .unwrap()
            .is_none());
        assert_eq!(db.get_link("tok").unwrap().unwrap().downloads_consumed, 2);

        // Only the two successful downloads left an attempt behind.
        assert!(db.get_attempt("a1").unwrap().is_some());
        assert!(db.get_attempt("a2").unwrap().is_some());
        assert!(db.get_attempt("a3").unwrap().is_none());
    }

    #[test]
    fn consume_download_refuses_expired_link() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        db.insert_link(&sample_link("tok", now, 2)).unwrap();

        let later = now + TimeDelta::hours(25);
        assert!(db
            .consume_download_and_record(&download_attempt("a1", later))
            .unwrap()
            .is_none());
        assert_eq!(db.get_link("tok").unwrap().unwrap().downloads_consumed, 0);
    }

    #[test]
    fn unrecordable_download_consumes_nothing() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        db.insert_link(&sample_link("tok", now, 2)).unwrap();
        db.append_attempt(&download_attempt("dup", now)).unwrap();

        let result = db.consume_download_and_record(&download_attempt("dup", now));
        assert!(matches!(result, Err(DatabaseError::AlreadyExists(_))));

        let link = db.get_link("tok").unwrap().unwrap();
        assert_eq!(link.downloads_consumed, 0);
        assert!(link.active);
    }

    #[test]
    fn concurrent_consumption_never_exceeds_limit() {
        let (db, _dir) = temp_db();
        let db = Arc::new(db);
        let now = Utc::now();
        db.insert_link(&sample_link("tok", now, 3)).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let db = db.clone();
                std::thread::spawn(move || {
                    db.consume_download_and_record(&download_attempt(&format!("a{i}"), now))
                        .unwrap()
                        .is_some()
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 3);
        let link = db.get_link("tok").unwrap().unwrap();
        assert_eq!(link.downloads_consumed, 3);
        assert!(!link.active);
        assert_eq!(db.list_attempts_for_owner("owner-1").unwrap().len(), 3);
    }

    #[test]
    fn block_link_records_action_once() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        db.insert_link(&sample_link("tok", now, 2)).unwrap();

        let first = db.block_link("tok", &block_action("tok", now)).unwrap();
        assert!(matches!(first, Some(BlockResult::Blocked(ref l)) if l.blocked && !l.active));

        let second = db.block_link("tok", &block_action("tok", now)).unwrap();
        assert!(matches!(second, Some(BlockResult::AlreadyBlocked(_))));

        assert_eq!(db.owner_actions_for_link("tok").unwrap().len(), 1);
        assert!(db
            .block_link("missing", &block_action("missing", now))
            .unwrap()
            .is_none());
    }

    #[test]
    fn otp_replacement_and_single_use() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        let challenge = |code: &str| OtpChallenge {
            link_token: "tok".to_string(),
            code: code.to_string(),
            issued_at: now,
            expires_at: now + TimeDelta::minutes(10),
            consumed: false,
        };

        db.replace_otp(&challenge("111111")).unwrap();
        db.replace_otp(&challenge("222222")).unwrap();

        assert!(!db.consume_otp("tok", "111111", now).unwrap());
        // The failed guess burned the live challenge.
        assert!(!db.consume_otp("tok", "222222", now).unwrap());

        db.replace_otp(&challenge("333333")).unwrap();
        assert!(db.consume_otp("tok", "333333", now).unwrap());
        assert!(!db.consume_otp("tok", "333333", now).unwrap());
    }

    #[test]
    fn expired_otp_fails_and_is_purged() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        let challenge = OtpChallenge {
            link_token: "tok".to_string(),
            code: "123456".to_string(),
            issued_at: now,
            expires_at: now + TimeDelta::minutes(10),
            consumed: false,
        };

        db.replace_otp(&challenge).unwrap();
        assert_eq!(db.purge_expired_otps(now).unwrap(), 0);
        assert_eq!(
            db.purge_expired_otps(now + TimeDelta::minutes(11)).unwrap(),
            1
        );
        // Purged: even a code that would still be live no longer verifies.
        assert!(!db.consume_otp("tok", "123456", now).unwrap());

        db.replace_otp(&challenge).unwrap();
        assert!(!db
            .consume_otp("tok", "123456", now + TimeDelta::minutes(10))
            .unwrap());
    }

    #[test]
    fn attempts_list_newest_first_per_owner() {
        let (db, _dir) = temp_db();
        let now = Utc::now();

        db.append_attempt(&sample_attempt("a1", "auth0|owner", now - TimeDelta::seconds(30)))
            .unwrap();
        db.append_attempt(&sample_attempt("a2", "auth0|owner", now)).unwrap();
        db.append_attempt(&sample_attempt("a3", "auth0|owner", now - TimeDelta::seconds(10)))
            .unwrap();
        db.append_attempt(&sample_attempt("b1", "auth0|owner2", now)).unwrap();

        let ids: Vec<String> = db
            .list_attempts_for_owner("auth0|owner")
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["a2", "a3", "a1"]);

        assert_eq!(db.list_attempts_for_owner("auth0|owner2").unwrap().len(), 1);
        assert!(db.list_attempts_for_owner("auth0").unwrap().is_empty());
    }

    #[test]
    fn attempts_are_append_only() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        db.append_attempt(&sample_attempt("a1", "owner", now)).unwrap();
        let result = db.append_attempt(&sample_attempt("a1", "owner", now));
        assert!(matches!(result, Err(DatabaseError::AlreadyExists(_))));
        assert!(db.get_attempt("a1").unwrap().is_some());
    }

    #[test]
    fn delete_file_deactivates_links() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        db.insert_file(&sample_file("f1", "owner-1", now)).unwrap();
        db.insert_link(&sample_link("t1", now, 2)).unwrap();
        db.insert_link(&sample_link("t2", now, 2)).unwrap();

        let (file, deactivated) = db.delete_file("f1").unwrap().unwrap();
        assert_eq!(file.id, "f1");
        assert_eq!(deactivated, 2);
        assert!(db.get_file("f1").unwrap().is_none());
        assert!(!db.get_link("t1").unwrap().unwrap().active);
        assert!(db.delete_file("f1").unwrap().is_none());
    }

    #[test]
    fn files_and_links_list_per_owner() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        db.insert_file(&sample_file("old", "owner-1", now - TimeDelta::hours(1)))
            .unwrap();
        db.insert_file(&sample_file("new", "owner-1", now)).unwrap();
        db.insert_file(&sample_file("other", "owner-2", now)).unwrap();

        let files = db.list_files_for_owner("owner-1").unwrap();
        assert_eq!(
            files.iter().map(|f| f.id.as_str()).collect::<Vec<_>>(),
            vec!["new", "old"]
        );

        db.insert_link(&sample_link("t1", now, 1)).unwrap();
        assert_eq!(db.list_links_for_owner("owner-1").unwrap().len(), 1);
        assert!(db.list_links_for_owner("owner-2").unwrap().is_empty());
    }

    #[test]
    fn expired_links_are_swept() {
        let (db, _dir) = temp_db();
        let now = Utc::now();
        db.insert_link(&sample_link("t1", now, 1)).unwrap();

        assert_eq!(db.deactivate_expired_links(now).unwrap(), 0);
        assert_eq!(
            db.deactivate_expired_links(now + TimeDelta::hours(25)).unwrap(),
            1
        );
        assert!(!db.get_link("t1").unwrap().unwrap().active);
    }

    #[test]
    fn make_index_key_ordering() {
        let now = Utc::now();
        let key_old = make_index_key("owner", now - TimeDelta::seconds(1), "a");
        let key_new = make_index_key("owner", now, "b");
        assert!(key_new < key_old, "Newer timestamps should sort first");
    }
}
