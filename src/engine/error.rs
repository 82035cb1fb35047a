// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::crypto::password::PasswordError;
use crate::crypto::VaultError;
use crate::storage::{DatabaseError, StorageError};

/// Errors of the access and deception engine.
///
/// Credential outcomes that end in a decoy are not errors; they are a
/// [`super::Resolution`]. Only the variants below leave the engine as
/// failures, and none of them is ever turned into a decoy.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Unknown, expired, exhausted or blocked; deliberately indistinguishable.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid or expired OTP")]
    InvalidOtp,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The caller does not own the targeted resource.
    #[error("not permitted")]
    Forbidden,

    /// Password-only access is disabled by the access policy.
    #[error("password-only access is disabled")]
    FlowDisabled,

    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("password hashing error: {0}")]
    Password(#[from] PasswordError),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("blob storage error: {0}")]
    Storage(#[from] StorageError),

    /// Writing the access attempt failed; the request must fail with it.
    #[error("audit write failed: {0}")]
    AuditWrite(#[source] DatabaseError),

    #[error("background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(e: tokio::task::JoinError) -> Self {
        EngineError::Task(e.to_string())
    }
}

impl EngineError {
    /// True for failures of infrastructure rather than of the request.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            EngineError::Vault(_)
                | EngineError::Password(_)
                | EngineError::Database(_)
                | EngineError::Storage(_)
                | EngineError::AuditWrite(_)
                | EngineError::Task(_)
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
