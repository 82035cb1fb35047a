// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Access & Deception Engine
//!
//! The core behind the HTTP surface:
//!
//! - [`files`]: sealed storage of real and decoy payloads
//! - [`registry`]: share link lifecycle and download bookkeeping
//! - [`otp`]: owner-mediated one-time codes
//! - [`verifier`]: credentials → allow / decoy / deny
//! - [`resolver`]: resolution → payload bytes, attempt recorded
//! - [`audit_log`]: attempt trail, owner alerts, block action
//!
//! Control flow of an access: verifier (registry, OTP) → resolver (vault)
//! → bytes, with the attempt appended to the audit log on the way out.

pub mod audit_log;
pub mod error;
pub mod files;
pub mod otp;
pub mod registry;
pub mod resolver;
pub mod verifier;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::clock::Clock;
use crate::config::AccessPolicy;
use crate::crypto::Vault;
use crate::models::ShareLink;
use crate::notify::{AlertDispatcher, Notifier};
use crate::storage::{BlobStorage, ShareDatabase};

pub use audit_log::{AuditLog, BlockOutcome, BlockTarget};
pub use error::{EngineError, EngineResult};
pub use files::{FileCatalog, NewPayload, Payload};
pub use otp::OtpAuthority;
pub use registry::{LinkRegistry, NewLink};
pub use resolver::DeceptionResolver;
pub use verifier::{AccessVerifier, OtpRequested, Resolution};

/// A link together with the name of the file it points to.
#[derive(Debug, Clone)]
pub struct OwnedLink {
    pub link: ShareLink,
    /// `None` once the asset has been deleted.
    pub filename: Option<String>,
}

/// Result of one maintenance sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub otps_purged: usize,
    pub links_expired: usize,
}

/// Façade wiring the engine components over shared stores.
#[derive(Clone)]
pub struct Engine {
    pub files: FileCatalog,
    pub links: LinkRegistry,
    pub otp: OtpAuthority,
    pub verifier: AccessVerifier,
    pub resolver: DeceptionResolver,
    pub audit: AuditLog,
    db: Arc<ShareDatabase>,
    clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn new(
        db: Arc<ShareDatabase>,
        blobs: BlobStorage,
        vault: Vault,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        policy: AccessPolicy,
    ) -> Self {
        let vault = Arc::new(vault);
        let dispatcher = AlertDispatcher::new(notifier, blobs.clone());

        let files = FileCatalog::new(db.clone(), blobs, vault, clock.clone());
        let links = LinkRegistry::new(db.clone(), clock.clone());
        let otp = OtpAuthority::new(db.clone(), clock.clone());
        let audit = AuditLog::new(db.clone(), links.clone(), dispatcher.clone(), clock.clone());
        let verifier = AccessVerifier::new(
            links.clone(),
            files.clone(),
            otp.clone(),
            dispatcher,
            policy,
        );
        let resolver =
            DeceptionResolver::new(files.clone(), links.clone(), audit.writer(), clock.clone());

        Self {
            files,
            links,
            otp,
            verifier,
            resolver,
            audit,
            db,
            clock,
        }
    }

    /// Fails when the record database cannot be read.
    pub fn health_check(&self) -> EngineResult<()> {
        Ok(self.db.health_check()?)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Single-factor access: link token and password.
    pub async fn access_with_password(
        &self,
        token: &str,
        password: &str,
        client_ip: &str,
    ) -> EngineResult<Payload> {
        let resolution = self.verifier.verify_password(token, password).await?;
        self.resolver.resolve(resolution, client_ip).await
    }

    /// Two-factor access: link token, owner-relayed OTP and password.
    pub async fn access_with_otp(
        &self,
        token: &str,
        otp: &str,
        password: &str,
        client_ip: &str,
    ) -> EngineResult<Payload> {
        let resolution = self.verifier.verify_otp(token, otp, password).await?;
        self.resolver.resolve(resolution, client_ip).await
    }

    pub fn request_otp(&self, token: &str) -> EngineResult<OtpRequested> {
        self.verifier.request_otp(token)
    }

    /// Owner's links, newest first, with the filename of their asset.
    pub fn owner_links(&self, owner_id: &str) -> EngineResult<Vec<OwnedLink>> {
        let names: HashMap<String, String> = self
            .files
            .list(owner_id)?
            .into_iter()
            .map(|f| (f.id, f.filename))
            .collect();

        Ok(self
            .links
            .list_for_owner(owner_id)?
            .into_iter()
            .map(|link| OwnedLink {
                filename: names.get(&link.file_id).cloned(),
                link,
            })
            .collect())
    }

    /// Purge dead OTP challenges and deactivate expired links.
    pub fn sweep(&self) -> EngineResult<SweepReport> {
        let report = SweepReport {
            otps_purged: self.otp.purge_expired()?,
            links_expired: self.links.sweep_expired()?,
        };
        if report != SweepReport::default() {
            info!(
                otps_purged = report.otps_purged,
                links_expired = report.links_expired,
                "Maintenance sweep"
            );
        }
        Ok(report)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}
