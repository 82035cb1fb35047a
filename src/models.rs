// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Domain Records
//!
//! Persistent entities of the share gate. All records are JSON-encoded
//! when stored in the embedded database.
//!
//! ## Record Categories
//!
//! - **File Assets**: an owner's real payload plus its decoy
//! - **Share Links**: password-protected, time- and count-limited pointers
//! - **OTP Challenges**: owner-mediated one-time codes bound to a link
//! - **Access Attempts**: append-only outcome of every recipient access
//! - **Owner Actions**: owner interventions such as blocking a link

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Payload Classes
// =============================================================================

/// Which of the two blobs of a file asset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PayloadClass {
    Real,
    Decoy,
}

impl PayloadClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadClass::Real => "real",
            PayloadClass::Decoy => "decoy",
        }
    }
}

impl std::fmt::Display for PayloadClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload served in response to an access attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServedPayload {
    Real,
    Decoy,
    None,
}

impl From<PayloadClass> for ServedPayload {
    fn from(class: PayloadClass) -> Self {
        match class {
            PayloadClass::Real => ServedPayload::Real,
            PayloadClass::Decoy => ServedPayload::Decoy,
        }
    }
}

// =============================================================================
// File Asset
// =============================================================================

/// An uploaded real file together with its decoy.
///
/// Immutable once created. The blobs themselves live in blob storage keyed by
/// `(id, class)`; only their sizes and the wrapped data key are kept here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileAsset {
    pub id: String,
    pub owner_id: String,
    /// Owner contact address captured at upload, used for hints and alerts.
    pub owner_contact: Option<String>,
    pub filename: String,
    pub decoy_filename: String,
    /// Plaintext size of the real payload in bytes.
    pub size: u64,
    pub decoy_size: u64,
    pub uploaded_at: DateTime<Utc>,
    /// Per-asset data key sealed under the master key (hex).
    pub wrapped_key: String,
}

impl FileAsset {
    /// Filename presented to the recipient for the given payload class.
    pub fn filename_for(&self, class: PayloadClass) -> &str {
        match class {
            PayloadClass::Real => &self.filename,
            PayloadClass::Decoy => &self.decoy_filename,
        }
    }
}

// =============================================================================
// Share Link
// =============================================================================

/// Lifecycle state of a share link as shown to its owner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Active,
    Expired,
    Exhausted,
    Blocked,
}

/// Tokenized, password-protected pointer to a file asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareLink {
    pub token: String,
    pub file_id: String,
    pub owner_id: String,
    /// Argon2 PHC string; the plaintext password is never stored.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub download_limit: u32,
    pub downloads_consumed: u32,
    pub active: bool,
    /// Set when the owner blocked the link; never cleared.
    #[serde(default)]
    pub blocked: bool,
}

impl ShareLink {
    /// A link is usable iff it is active, not yet expired, and has
    /// downloads left.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.active && now < self.expires_at && self.downloads_consumed < self.download_limit
    }

    pub fn status(&self, now: DateTime<Utc>) -> LinkStatus {
        if self.blocked {
            LinkStatus::Blocked
        } else if self.downloads_consumed >= self.download_limit {
            LinkStatus::Exhausted
        } else if now >= self.expires_at {
            LinkStatus::Expired
        } else if !self.active {
            // Deactivated without a more specific cause (file deleted).
            LinkStatus::Blocked
        } else {
            LinkStatus::Active
        }
    }
}

// =============================================================================
// OTP Challenge
// =============================================================================

/// Short-lived single-use numeric code bound to one share link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OtpChallenge {
    pub link_token: String,
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl OtpChallenge {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.consumed && now < self.expires_at
    }
}

// =============================================================================
// Access Attempt
// =============================================================================

/// Immutable record of one recipient access and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessAttempt {
    pub id: String,
    pub link_token: String,
    pub file_id: String,
    /// Real filename of the asset at the time of the attempt.
    pub filename: String,
    pub owner_id: String,
    pub attempted_at: DateTime<Utc>,
    /// Outcome of the password comparison; `None` when no comparison was
    /// made because the OTP check failed first.
    pub password_correct: Option<bool>,
    pub file_type_served: ServedPayload,
    pub ip_address: String,
    /// Present only when a decoy was served.
    pub verification_code: Option<String>,
    /// Present only for the OTP flow.
    pub otp_verified: Option<bool>,
}

impl AccessAttempt {
    pub fn is_intrusion(&self) -> bool {
        self.file_type_served == ServedPayload::Decoy
    }
}

// =============================================================================
// Owner Action
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OwnerActionKind {
    Block,
}

/// What an owner action was aimed at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionTarget {
    Attempt { attempt_id: String },
    Link { link_token: String },
}

/// Persisted record of an owner intervention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerAction {
    pub id: String,
    pub target: ActionTarget,
    /// Link the action was applied to.
    pub link_token: String,
    pub action: OwnerActionKind,
    pub actor: String,
    pub performed_at: DateTime<Utc>,
}
