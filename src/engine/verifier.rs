// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential verification.
//!
//! Turns submitted credentials into a [`Resolution`]. The verifier never
//! touches payloads or writes attempts; that is the resolver's job.
//!
//! Single-factor: unusable link → deny; password match → allow; mismatch →
//! decoy. Two-factor: unusable link → deny; OTP failure → deny with
//! `InvalidOtp` and no password comparison; otherwise as single-factor.

use crate::config::AccessPolicy;
use crate::crypto::codes::{mask_contact, token_prefix};
use crate::crypto::verify_password;
use crate::models::{FileAsset, ShareLink};
use crate::notify::{AlertDispatcher, Notification};

use super::error::{EngineError, EngineResult};
use super::files::FileCatalog;
use super::otp::{OtpAuthority, OTP_TTL_SECS};
use super::registry::LinkRegistry;

/// Link and asset a credential check was made against.
#[derive(Debug, Clone)]
pub struct Granted {
    pub link: ShareLink,
    pub asset: FileAsset,
    /// `Some(true)` when the OTP flow was used, `None` for password-only.
    pub otp_verified: Option<bool>,
}

#[derive(Debug, Clone)]
pub enum DenyReason {
    /// Unknown, expired, exhausted or inactive link. No attempt is recorded.
    LinkInvalid,
    /// The OTP did not verify; the password was never compared.
    InvalidOtp { link: ShareLink, asset: FileAsset },
}

/// Outcome of credential verification.
#[derive(Debug, Clone)]
pub enum Resolution {
    Allow(Granted),
    Decoy(Granted),
    Deny(DenyReason),
}

/// Answer to an OTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRequested {
    pub owner_email_hint: String,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct AccessVerifier {
    links: LinkRegistry,
    files: FileCatalog,
    otp: OtpAuthority,
    dispatcher: AlertDispatcher,
    policy: AccessPolicy,
}

impl AccessVerifier {
    pub fn new(
        links: LinkRegistry,
        files: FileCatalog,
        otp: OtpAuthority,
        dispatcher: AlertDispatcher,
        policy: AccessPolicy,
    ) -> Self {
        Self {
            links,
            files,
            otp,
            dispatcher,
            policy,
        }
    }

    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    /// Usable link plus its asset, or `None` when the link must be denied.
    fn usable_target(&self, token: &str) -> EngineResult<Option<(ShareLink, FileAsset)>> {
        let link = match self.links.lookup_usable(token) {
            Ok(link) => link,
            Err(EngineError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        match self.files.asset(&link.file_id) {
            Ok(asset) => Ok(Some((link, asset))),
            Err(EngineError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Issue an OTP for a usable link and route the code to its owner.
    pub fn request_otp(&self, token: &str) -> EngineResult<OtpRequested> {
        let (link, asset) = self
            .usable_target(token)?
            .ok_or(EngineError::NotFound("link"))?;

        let issued = self.otp.issue(&link.token)?;
        self.dispatcher.dispatch(Notification::AccessCode {
            owner_id: asset.owner_id.clone(),
            contact: asset.owner_contact.clone(),
            filename: asset.filename.clone(),
            code: issued.code,
            expires_in_secs: OTP_TTL_SECS,
        });

        tracing::info!(token = token_prefix(&link.token), "Access code issued to owner");

        Ok(OtpRequested {
            owner_email_hint: asset
                .owner_contact
                .as_deref()
                .map(mask_contact)
                .unwrap_or_else(|| "***".to_string()),
            expires_in: OTP_TTL_SECS,
        })
    }

    /// Password-only verification.
    pub async fn verify_password(&self, token: &str, password: &str) -> EngineResult<Resolution> {
        if self.policy == AccessPolicy::OtpOnly {
            return Err(EngineError::FlowDisabled);
        }

        let Some((link, asset)) = self.usable_target(token)? else {
            return Ok(Resolution::Deny(DenyReason::LinkInvalid));
        };

        self.compare_password(link, asset, password, None).await
    }

    /// OTP then password verification.
    pub async fn verify_otp(
        &self,
        token: &str,
        otp: &str,
        password: &str,
    ) -> EngineResult<Resolution> {
        let Some((link, asset)) = self.usable_target(token)? else {
            return Ok(Resolution::Deny(DenyReason::LinkInvalid));
        };

        if !self.otp.verify(&link.token, otp)? {
            return Ok(Resolution::Deny(DenyReason::InvalidOtp { link, asset }));
        }

        self.compare_password(link, asset, password, Some(true)).await
    }

    async fn compare_password(
        &self,
        link: ShareLink,
        asset: FileAsset,
        password: &str,
        otp_verified: Option<bool>,
    ) -> EngineResult<Resolution> {
        let candidate = password.to_string();
        let stored = link.password_hash.clone();
        let matches =
            tokio::task::spawn_blocking(move || verify_password(&candidate, &stored)).await??;

        let granted = Granted {
            link,
            asset,
            otp_verified,
        };
        Ok(if matches {
            Resolution::Allow(granted)
        } else {
            Resolution::Decoy(granted)
        })
    }
}
