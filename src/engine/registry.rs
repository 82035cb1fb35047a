// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Share link lifecycle: creation, lookup, download bookkeeping and
//! deactivation.

use std::sync::Arc;

use chrono::TimeDelta;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::crypto::codes::{link_token, token_prefix};
use crate::crypto::hash_password;
use crate::models::{AccessAttempt, OwnerAction, ShareLink};
use crate::storage::{BlockResult, DatabaseError, ShareDatabase};

use super::error::{EngineError, EngineResult};

pub const DEFAULT_EXPIRY_HOURS: i64 = 24;
pub const DEFAULT_DOWNLOAD_LIMIT: i64 = 10;

/// Attempts at drawing a token that is not yet taken.
const TOKEN_ATTEMPTS: usize = 5;

/// Parameters of a new link.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub file_id: String,
    pub password: String,
    pub expiry_hours: i64,
    pub download_limit: i64,
}

#[derive(Clone)]
pub struct LinkRegistry {
    db: Arc<ShareDatabase>,
    clock: Arc<dyn Clock>,
}

impl LinkRegistry {
    pub fn new(db: Arc<ShareDatabase>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Create a link to one of `owner_id`'s assets.
    ///
    /// Rejects non-positive expiry or limit, and an empty password.
    pub async fn create(&self, owner_id: &str, params: NewLink) -> EngineResult<ShareLink> {
        if params.expiry_hours <= 0 {
            return Err(EngineError::InvalidParameter(
                "expiry_hours must be greater than zero".to_string(),
            ));
        }
        if params.download_limit <= 0 {
            return Err(EngineError::InvalidParameter(
                "download_limit must be greater than zero".to_string(),
            ));
        }
        let download_limit = u32::try_from(params.download_limit).map_err(|_| {
            EngineError::InvalidParameter("download_limit is too large".to_string())
        })?;
        if params.password.is_empty() {
            return Err(EngineError::InvalidParameter(
                "password must not be empty".to_string(),
            ));
        }

        let now = self.clock.now();
        let expires_at = TimeDelta::try_hours(params.expiry_hours)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| EngineError::InvalidParameter("expiry_hours is too large".to_string()))?;

        match self.db.get_file(&params.file_id)? {
            Some(asset) if asset.owner_id == owner_id => {}
            _ => return Err(EngineError::NotFound("file")),
        }

        let password = params.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

        for _ in 0..TOKEN_ATTEMPTS {
            let link = ShareLink {
                token: link_token(),
                file_id: params.file_id.clone(),
                owner_id: owner_id.to_string(),
                password_hash: password_hash.clone(),
                created_at: now,
                expires_at,
                download_limit,
                downloads_consumed: 0,
                active: true,
                blocked: false,
            };

            match self.db.insert_link(&link) {
                Ok(()) => {
                    info!(
                        token = token_prefix(&link.token),
                        file_id = %link.file_id,
                        expires_at = %link.expires_at,
                        download_limit,
                        "Share link created"
                    );
                    return Ok(link);
                }
                Err(DatabaseError::AlreadyExists(_)) => {
                    warn!("Link token collision, drawing a new token");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::Task(
            "could not allocate a unique link token".to_string(),
        ))
    }

    /// Raw lookup, regardless of usability.
    pub fn lookup(&self, token: &str) -> EngineResult<ShareLink> {
        self.db.get_link(token)?.ok_or(EngineError::NotFound("link"))
    }

    /// Lookup that treats expired, exhausted and inactive links as missing.
    pub fn lookup_usable(&self, token: &str) -> EngineResult<ShareLink> {
        match self.db.get_link(token)? {
            Some(link) if link.is_usable(self.clock.now()) => Ok(link),
            _ => Err(EngineError::NotFound("link")),
        }
    }

    /// Consume one download unit for `attempt`, recording the attempt in
    /// the same transaction. Losing a race for the last unit, or any other
    /// unusable state, is `NotFound` and records nothing. A storage failure
    /// is `AuditWrite` and consumes nothing.
    pub fn register_successful_download(&self, attempt: &AccessAttempt) -> EngineResult<ShareLink> {
        let token = attempt.link_token.as_str();
        let link = self
            .db
            .consume_download_and_record(attempt)
            .map_err(|e| {
                error!(
                    attempt_id = %attempt.id,
                    token = token_prefix(token),
                    error = %e,
                    "Failed to record download"
                );
                EngineError::AuditWrite(e)
            })?
            .ok_or(EngineError::NotFound("link"))?;

        if !link.active {
            info!(token = token_prefix(token), "Share link exhausted");
        }
        Ok(link)
    }

    /// Irreversibly deactivate a link on behalf of an owner action.
    /// Idempotent: a second call reports `AlreadyBlocked` and records
    /// nothing.
    pub fn deactivate(&self, token: &str, action: &OwnerAction) -> EngineResult<BlockResult> {
        self.db
            .block_link(token, action)?
            .ok_or(EngineError::NotFound("link"))
    }

    pub fn list_for_owner(&self, owner_id: &str) -> EngineResult<Vec<ShareLink>> {
        Ok(self.db.list_links_for_owner(owner_id)?)
    }

    /// Deactivate links whose expiry has passed.
    pub fn sweep_expired(&self) -> EngineResult<usize> {
        Ok(self.db.deactivate_expired_links(self.clock.now())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::crypto::verify_password;
    use crate::models::{ActionTarget, FileAsset, OwnerActionKind, ServedPayload};
    use chrono::Utc;
    use tempfile::TempDir;

    fn registry() -> (TempDir, LinkRegistry, Arc<ManualClock>) {
        let temp = TempDir::new().unwrap();
        let db = Arc::new(ShareDatabase::open(&temp.path().join("share.redb")).unwrap());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        db.insert_file(&FileAsset {
            id: "f1".to_string(),
            owner_id: "owner".to_string(),
            owner_contact: None,
            filename: "a.txt".to_string(),
            decoy_filename: "b.txt".to_string(),
            size: 1,
            decoy_size: 1,
            uploaded_at: clock.now(),
            wrapped_key: String::new(),
        })
        .unwrap();
        (temp, LinkRegistry::new(db, clock.clone()), clock)
    }

    fn download(link: &ShareLink, clock: &ManualClock) -> AccessAttempt {
        AccessAttempt {
            id: uuid::Uuid::new_v4().to_string(),
            link_token: link.token.clone(),
            file_id: link.file_id.clone(),
            filename: "a.txt".to_string(),
            owner_id: link.owner_id.clone(),
            attempted_at: clock.now(),
            password_correct: Some(true),
            file_type_served: ServedPayload::Real,
            ip_address: "203.0.113.9".to_string(),
            verification_code: None,
            otp_verified: None,
        }
    }

    fn block(token: &str, clock: &ManualClock) -> OwnerAction {
        OwnerAction {
            id: uuid::Uuid::new_v4().to_string(),
            target: ActionTarget::Link {
                link_token: token.to_string(),
            },
            link_token: token.to_string(),
            action: OwnerActionKind::Block,
            actor: "owner".to_string(),
            performed_at: clock.now(),
        }
    }

    fn params(expiry_hours: i64, download_limit: i64) -> NewLink {
        NewLink {
            file_id: "f1".to_string(),
            password: "hunter2".to_string(),
            expiry_hours,
            download_limit,
        }
    }

    #[tokio::test]
    async fn create_hashes_password() {
        let (_temp, registry, clock) = registry();
        let link = registry.create("owner", params(24, 3)).await.unwrap();

        assert_ne!(link.password_hash, "hunter2");
        assert!(verify_password("hunter2", &link.password_hash).unwrap());
        assert_eq!(link.expires_at, clock.now() + TimeDelta::hours(24));
        assert_eq!(link.download_limit, 3);
        assert!(link.active);
        assert_eq!(registry.lookup(&link.token).unwrap(), link);
    }

    #[tokio::test]
    async fn create_rejects_bad_parameters() {
        let (_temp, registry, _clock) = registry();
        for (hours, limit) in [(0, 1), (-1, 1), (1, 0), (1, -5), (i64::MAX, 1)] {
            let result = registry.create("owner", params(hours, limit)).await;
            assert!(
                matches!(result, Err(EngineError::InvalidParameter(_))),
                "expiry={hours} limit={limit}"
            );
        }

        let mut empty = params(1, 1);
        empty.password.clear();
        assert!(matches!(
            registry.create("owner", empty).await,
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn create_requires_ownership() {
        let (_temp, registry, _clock) = registry();
        let result = registry.create("someone-else", params(1, 1)).await;
        assert!(matches!(result, Err(EngineError::NotFound("file"))));
    }

    #[tokio::test]
    async fn tokens_are_unique() {
        let (_temp, registry, _clock) = registry();
        let a = registry.create("owner", params(1, 1)).await.unwrap();
        let b = registry.create("owner", params(1, 1)).await.unwrap();
        assert_ne!(a.token, b.token);
        assert!(a.token.len() >= 22);
    }

    #[tokio::test]
    async fn expired_link_is_not_usable() {
        let (_temp, registry, clock) = registry();
        let link = registry.create("owner", params(1, 5)).await.unwrap();
        assert!(registry.lookup_usable(&link.token).is_ok());

        clock.advance(TimeDelta::hours(1));
        assert!(matches!(
            registry.lookup_usable(&link.token),
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(
            registry.register_successful_download(&download(&link, &clock)),
            Err(EngineError::NotFound(_))
        ));

        assert_eq!(registry.sweep_expired().unwrap(), 1);
        assert!(!registry.lookup(&link.token).unwrap().active);
    }

    #[tokio::test]
    async fn download_limit_flips_active() {
        let (_temp, registry, clock) = registry();
        let link = registry.create("owner", params(1, 1)).await.unwrap();

        let after = registry
            .register_successful_download(&download(&link, &clock))
            .unwrap();
        assert_eq!(after.downloads_consumed, 1);
        assert!(!after.active);
        assert!(registry.lookup_usable(&link.token).is_err());
    }

    #[tokio::test]
    async fn deactivate_is_idempotent() {
        let (_temp, registry, clock) = registry();
        let link = registry.create("owner", params(1, 1)).await.unwrap();

        assert!(matches!(
            registry.deactivate(&link.token, &block(&link.token, &clock)),
            Ok(BlockResult::Blocked(_))
        ));
        assert!(matches!(
            registry.deactivate(&link.token, &block(&link.token, &clock)),
            Ok(BlockResult::AlreadyBlocked(_))
        ));
        assert!(registry.lookup_usable(&link.token).is_err());
        assert!(matches!(
            registry.deactivate("unknown", &block("unknown", &clock)),
            Err(EngineError::NotFound(_))
        ));
    }
}
