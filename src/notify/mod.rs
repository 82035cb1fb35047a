// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Owner Notifications
//!
//! The owner is reached through a pluggable [`Notifier`]. Three messages
//! exist: the OTP a recipient asked for, an authorized-access notice, and an
//! intrusion alert. Delivery is always fire-and-forget through
//! [`AlertDispatcher`]: a failing notifier is logged and audited but never
//! affects the request that triggered it.

pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::audit_log;
use crate::storage::{AuditEvent, AuditEventType, BlobStorage};

pub use webhook::WebhookNotifier;

/// Message for the owner.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A recipient requested access; the owner relays the code.
    AccessCode {
        owner_id: String,
        contact: Option<String>,
        filename: String,
        code: String,
        expires_in_secs: i64,
    },
    /// The real file was released.
    AuthorizedAccess {
        owner_id: String,
        contact: Option<String>,
        filename: String,
        accessed_at: DateTime<Utc>,
        ip_address: String,
        otp_verified: Option<bool>,
    },
    /// A wrong password was submitted and the decoy was served.
    Intrusion {
        owner_id: String,
        contact: Option<String>,
        filename: String,
        attempted_at: DateTime<Utc>,
        ip_address: String,
        verification_code: String,
        otp_verified: Option<bool>,
    },
}

impl Notification {
    pub fn owner_id(&self) -> &str {
        match self {
            Notification::AccessCode { owner_id, .. }
            | Notification::AuthorizedAccess { owner_id, .. }
            | Notification::Intrusion { owner_id, .. } => owner_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::AccessCode { .. } => "access_code",
            Notification::AuthorizedAccess { .. } => "authorized_access",
            Notification::Intrusion { .. } => "intrusion",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("notifier rejected message with status {0}")]
    Rejected(u16),

    #[error("{0}")]
    Other(String),
}

/// Delivery channel to the owner (email/SMS collaborator, log, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Notifier used when no delivery endpoint is configured.
///
/// Alerts are written to the log. Access codes are only logged in
/// development builds.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        match notification {
            #[cfg(any(test, feature = "dev"))]
            Notification::AccessCode {
                owner_id,
                filename,
                code,
                ..
            } => {
                info!(owner_id = %owner_id, filename = %filename, code = %code, "DEV: access code for owner");
            }
            #[cfg(not(any(test, feature = "dev")))]
            Notification::AccessCode {
                owner_id,
                filename,
                code: _,
                ..
            } => {
                warn!(owner_id = %owner_id, filename = %filename, "Access code issued but no notifier is configured");
            }
            Notification::AuthorizedAccess {
                owner_id,
                filename,
                ip_address,
                ..
            } => {
                info!(owner_id = %owner_id, filename = %filename, ip = %ip_address, "Authorized file access");
            }
            Notification::Intrusion {
                owner_id,
                filename,
                ip_address,
                verification_code,
                ..
            } => {
                warn!(
                    owner_id = %owner_id,
                    filename = %filename,
                    ip = %ip_address,
                    verification_code = %verification_code,
                    "Intrusion alert"
                );
            }
        }
        Ok(())
    }
}

/// Fire-and-forget front of a [`Notifier`].
#[derive(Clone)]
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    storage: BlobStorage,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, storage: BlobStorage) -> Self {
        Self { notifier, storage }
    }

    /// Hand a notification to a background task and return immediately.
    pub fn dispatch(&self, notification: Notification) {
        let notifier = self.notifier.clone();
        let storage = self.storage.clone();

        tokio::spawn(async move {
            match notifier.send(&notification).await {
                Ok(()) => {
                    debug!(kind = notification.kind(), "Owner notification delivered");
                }
                Err(e) => {
                    warn!(
                        kind = notification.kind(),
                        owner_id = %notification.owner_id(),
                        error = %e,
                        "Owner notification failed"
                    );
                    audit_log!(
                        &storage,
                        AuditEvent::new(AuditEventType::NotificationFailed)
                            .with_user(notification.owner_id())
                            .with_details(serde_json::json!({ "kind": notification.kind() }))
                            .failed(e.to_string())
                    );
                }
            }
        });
    }
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDispatcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory notifier for tests.

    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
        fail: bool,
    }

    impl RecordingNotifier {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn sent(&self) -> Vec<Notification> {
            self.sent.lock().unwrap().clone()
        }

        /// Wait until at least `count` notifications were handed over.
        pub async fn wait_for(&self, count: usize) -> Vec<Notification> {
            for _ in 0..200 {
                let sent = self.sent();
                if sent.len() >= count {
                    return sent;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            self.sent()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
            self.sent.lock().unwrap().push(notification.clone());
            if self.fail {
                return Err(NotificationError::Other("simulated outage".to_string()));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingNotifier;
    use super::*;
    use crate::storage::{AuditRepository, StoragePaths};
    use tempfile::TempDir;

    fn storage() -> (TempDir, BlobStorage) {
        let temp = TempDir::new().unwrap();
        let mut storage = BlobStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, storage)
    }

    fn intrusion() -> Notification {
        Notification::Intrusion {
            owner_id: "owner".to_string(),
            contact: Some("owner@example.com".to_string()),
            filename: "secret.pdf".to_string(),
            attempted_at: Utc::now(),
            ip_address: "10.0.0.9".to_string(),
            verification_code: "482913".to_string(),
            otp_verified: None,
        }
    }

    #[test]
    fn notifications_serialize_with_kind_tag() {
        let json = serde_json::to_value(intrusion()).unwrap();
        assert_eq!(json["kind"], "intrusion");
        assert_eq!(json["verification_code"], "482913");
    }

    #[tokio::test]
    async fn dispatch_delivers_in_background() {
        let (_temp, storage) = storage();
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = AlertDispatcher::new(notifier.clone(), storage);

        dispatcher.dispatch(intrusion());

        let sent = notifier.wait_for(1).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind(), "intrusion");
    }

    #[tokio::test]
    async fn failed_delivery_is_audited() {
        let (_temp, storage) = storage();
        let notifier = Arc::new(RecordingNotifier::failing());
        let dispatcher = AlertDispatcher::new(notifier.clone(), storage.clone());

        dispatcher.dispatch(intrusion());
        notifier.wait_for(1).await;

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let repo = AuditRepository::new(&storage);
        let mut events = Vec::new();
        for _ in 0..200 {
            events = repo.read_events(&today).unwrap_or_default();
            if !events.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::NotificationFailed);
        assert!(!events[0].success);
    }

    #[tokio::test]
    async fn log_notifier_never_fails() {
        assert!(LogNotifier.send(&intrusion()).await.is_ok());
        let code = Notification::AccessCode {
            owner_id: "owner".to_string(),
            contact: None,
            filename: "plans.pdf".to_string(),
            code: "482913".to_string(),
            expires_in_secs: 600,
        };
        assert!(LogNotifier.send(&code).await.is_ok());
    }
}
