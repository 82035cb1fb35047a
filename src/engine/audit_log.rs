// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access attempt trail and owner alerting.
//!
//! [`AttemptWriter`] is the append-only handle used while resolving access;
//! [`AttemptReader`] is the owner's query surface. [`AuditLog`] bundles
//! both together with the block action.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::crypto::codes::token_prefix;
use crate::models::{
    AccessAttempt, ActionTarget, FileAsset, OwnerAction, OwnerActionKind, ServedPayload,
};
use crate::notify::{AlertDispatcher, Notification};
use crate::storage::{BlockResult, ShareDatabase};

use super::error::{EngineError, EngineResult};
use super::registry::LinkRegistry;

/// Append-only handle on the attempt trail.
#[derive(Clone)]
pub struct AttemptWriter {
    db: Arc<ShareDatabase>,
    dispatcher: AlertDispatcher,
}

impl AttemptWriter {
    pub fn new(db: Arc<ShareDatabase>, dispatcher: AlertDispatcher) -> Self {
        Self { db, dispatcher }
    }

    /// Persist an attempt, then alert the owner for served payloads.
    ///
    /// A failed write is returned as [`EngineError::AuditWrite`] and no
    /// alert is sent. Alert delivery itself is fire-and-forget.
    pub fn record(&self, attempt: &AccessAttempt, asset: &FileAsset) -> EngineResult<()> {
        if let Err(e) = self.db.append_attempt(attempt) {
            error!(
                attempt_id = %attempt.id,
                token = token_prefix(&attempt.link_token),
                error = %e,
                "Failed to record access attempt"
            );
            return Err(EngineError::AuditWrite(e));
        }
        self.alert(attempt, asset);
        Ok(())
    }

    /// Notify the owner about an attempt that is already persisted.
    pub fn alert(&self, attempt: &AccessAttempt, asset: &FileAsset) {
        match attempt.file_type_served {
            ServedPayload::Decoy => self.dispatcher.dispatch(Notification::Intrusion {
                owner_id: asset.owner_id.clone(),
                contact: asset.owner_contact.clone(),
                filename: asset.filename.clone(),
                attempted_at: attempt.attempted_at,
                ip_address: attempt.ip_address.clone(),
                verification_code: attempt.verification_code.clone().unwrap_or_default(),
                otp_verified: attempt.otp_verified,
            }),
            ServedPayload::Real => self.dispatcher.dispatch(Notification::AuthorizedAccess {
                owner_id: asset.owner_id.clone(),
                contact: asset.owner_contact.clone(),
                filename: asset.filename.clone(),
                accessed_at: attempt.attempted_at,
                ip_address: attempt.ip_address.clone(),
                otp_verified: attempt.otp_verified,
            }),
            ServedPayload::None => {}
        }
    }
}

/// Read-only query surface of the attempt trail.
#[derive(Clone)]
pub struct AttemptReader {
    db: Arc<ShareDatabase>,
}

impl AttemptReader {
    pub fn new(db: Arc<ShareDatabase>) -> Self {
        Self { db }
    }

    /// Attempts against `owner_id`'s links, newest first.
    pub fn list(&self, owner_id: &str) -> EngineResult<Vec<AccessAttempt>> {
        Ok(self.db.list_attempts_for_owner(owner_id)?)
    }

    pub fn get(&self, attempt_id: &str) -> EngineResult<Option<AccessAttempt>> {
        Ok(self.db.get_attempt(attempt_id)?)
    }
}

/// What the owner wants blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockTarget {
    Attempt(String),
    Link(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    Blocked { link_token: String },
    /// The link was already blocked; nothing was recorded.
    AlreadyBlocked { link_token: String },
}

impl BlockOutcome {
    pub fn link_token(&self) -> &str {
        match self {
            BlockOutcome::Blocked { link_token } | BlockOutcome::AlreadyBlocked { link_token } => {
                link_token
            }
        }
    }
}

#[derive(Clone)]
pub struct AuditLog {
    writer: AttemptWriter,
    reader: AttemptReader,
    links: LinkRegistry,
    clock: Arc<dyn Clock>,
}

impl AuditLog {
    pub fn new(
        db: Arc<ShareDatabase>,
        links: LinkRegistry,
        dispatcher: AlertDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            writer: AttemptWriter::new(db.clone(), dispatcher),
            reader: AttemptReader::new(db),
            links,
            clock,
        }
    }

    pub fn writer(&self) -> AttemptWriter {
        self.writer.clone()
    }

    pub fn reader(&self) -> &AttemptReader {
        &self.reader
    }

    pub fn record(&self, attempt: &AccessAttempt, asset: &FileAsset) -> EngineResult<()> {
        self.writer.record(attempt, asset)
    }

    pub fn list(&self, owner_id: &str) -> EngineResult<Vec<AccessAttempt>> {
        self.reader.list(owner_id)
    }

    /// Block the link behind an attempt or a token on behalf of `actor`.
    ///
    /// Unknown targets are `NotFound`; targets owned by someone else are
    /// `Forbidden`. Re-blocking succeeds without recording anything.
    pub fn block(&self, target: BlockTarget, actor: &str) -> EngineResult<BlockOutcome> {
        let (link_token, action_target) = match target {
            BlockTarget::Attempt(attempt_id) => {
                let attempt = self
                    .reader
                    .get(&attempt_id)?
                    .ok_or(EngineError::NotFound("attempt"))?;
                if attempt.owner_id != actor {
                    return Err(EngineError::Forbidden);
                }
                (attempt.link_token, ActionTarget::Attempt { attempt_id })
            }
            BlockTarget::Link(token) => {
                let link = self.links.lookup(&token)?;
                if link.owner_id != actor {
                    return Err(EngineError::Forbidden);
                }
                (
                    token.clone(),
                    ActionTarget::Link { link_token: token },
                )
            }
        };

        let action = OwnerAction {
            id: uuid::Uuid::new_v4().to_string(),
            target: action_target,
            link_token: link_token.clone(),
            action: OwnerActionKind::Block,
            actor: actor.to_string(),
            performed_at: self.clock.now(),
        };

        match self.links.deactivate(&link_token, &action) {
            Ok(BlockResult::Blocked(_)) => {
                info!(
                    token = token_prefix(&link_token),
                    actor = %actor,
                    "Share link blocked by owner"
                );
                Ok(BlockOutcome::Blocked { link_token })
            }
            Ok(BlockResult::AlreadyBlocked(_)) => Ok(BlockOutcome::AlreadyBlocked { link_token }),
            Err(EngineError::NotFound(what)) => {
                warn!(token = token_prefix(&link_token), "Attempt references a missing link");
                Err(EngineError::NotFound(what))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::models::ShareLink;
    use crate::notify::testing::RecordingNotifier;
    use crate::storage::{BlobStorage, StoragePaths};
    use chrono::{TimeDelta, Utc};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        db: Arc<ShareDatabase>,
        log: AuditLog,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let paths = StoragePaths::new(temp.path());
        let mut blobs = BlobStorage::new(paths.clone());
        blobs.initialize().unwrap();
        let db = Arc::new(ShareDatabase::open(&paths.database()).unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = AlertDispatcher::new(notifier.clone(), blobs);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let links = LinkRegistry::new(db.clone(), clock.clone());
        let log = AuditLog::new(db.clone(), links, dispatcher, clock);

        let now = Utc::now();
        db.insert_link(&ShareLink {
            token: "tok".to_string(),
            file_id: "f1".to_string(),
            owner_id: "owner".to_string(),
            password_hash: String::new(),
            created_at: now,
            expires_at: now + TimeDelta::hours(1),
            download_limit: 1,
            downloads_consumed: 0,
            active: true,
            blocked: false,
        })
        .unwrap();

        Fixture {
            _temp: temp,
            db,
            log,
            notifier,
        }
    }

    fn asset() -> FileAsset {
        FileAsset {
            id: "f1".to_string(),
            owner_id: "owner".to_string(),
            owner_contact: Some("owner@example.com".to_string()),
            filename: "plans.pdf".to_string(),
            decoy_filename: "menu.pdf".to_string(),
            size: 1,
            decoy_size: 1,
            uploaded_at: Utc::now(),
            wrapped_key: String::new(),
        }
    }

    fn attempt(id: &str, served: ServedPayload) -> AccessAttempt {
        AccessAttempt {
            id: id.to_string(),
            link_token: "tok".to_string(),
            file_id: "f1".to_string(),
            filename: "plans.pdf".to_string(),
            owner_id: "owner".to_string(),
            attempted_at: Utc::now(),
            password_correct: Some(served == ServedPayload::Real),
            file_type_served: served,
            ip_address: "198.51.100.4".to_string(),
            verification_code: (served == ServedPayload::Decoy).then(|| "555111".to_string()),
            otp_verified: None,
        }
    }

    #[tokio::test]
    async fn decoy_attempt_alerts_owner() {
        let f = fixture();
        f.log
            .record(&attempt("a1", ServedPayload::Decoy), &asset())
            .unwrap();

        let sent = f.notifier.wait_for(1).await;
        assert!(matches!(
            &sent[0],
            Notification::Intrusion { verification_code, ip_address, .. }
                if verification_code == "555111" && ip_address == "198.51.100.4"
        ));
    }

    #[tokio::test]
    async fn denied_attempt_is_recorded_silently() {
        let f = fixture();
        f.log
            .record(&attempt("a1", ServedPayload::None), &asset())
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(f.notifier.sent().is_empty());
        assert_eq!(f.log.list("owner").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_record_is_an_audit_failure() {
        let f = fixture();
        f.log
            .record(&attempt("a1", ServedPayload::Real), &asset())
            .unwrap();
        let result = f.log.record(&attempt("a1", ServedPayload::Real), &asset());
        assert!(matches!(result, Err(EngineError::AuditWrite(_))));
    }

    #[tokio::test]
    async fn block_via_attempt_is_idempotent() {
        let f = fixture();
        f.log
            .record(&attempt("a1", ServedPayload::Decoy), &asset())
            .unwrap();

        let first = f.log.block(BlockTarget::Attempt("a1".to_string()), "owner").unwrap();
        assert_eq!(
            first,
            BlockOutcome::Blocked {
                link_token: "tok".to_string()
            }
        );

        let again = f.log.block(BlockTarget::Link("tok".to_string()), "owner").unwrap();
        assert!(matches!(again, BlockOutcome::AlreadyBlocked { .. }));

        let link = f.db.get_link("tok").unwrap().unwrap();
        assert!(link.blocked && !link.active);
        assert_eq!(f.db.owner_actions_for_link("tok").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn block_checks_ownership() {
        let f = fixture();
        f.log
            .record(&attempt("a1", ServedPayload::Decoy), &asset())
            .unwrap();

        assert!(matches!(
            f.log.block(BlockTarget::Attempt("a1".to_string()), "mallory"),
            Err(EngineError::Forbidden)
        ));
        assert!(matches!(
            f.log.block(BlockTarget::Attempt("missing".to_string()), "owner"),
            Err(EngineError::NotFound("attempt"))
        ));
        assert!(matches!(
            f.log.block(BlockTarget::Link("missing".to_string()), "owner"),
            Err(EngineError::NotFound("link"))
        ));
        assert!(f.db.get_link("tok").unwrap().unwrap().active);
    }
}
