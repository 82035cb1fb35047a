// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operational audit log.
//!
//! Owner operations and side-channel events (OTP issuance, notification
//! failures) are appended to a daily JSONL file. Recipient access attempts
//! are not stored here; they live in the record database so they can be
//! queried per owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BlobStorage, StorageError, StorageResult};

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // File events
    FileUploaded,
    FileDeleted,
    OwnerDownload,

    // Link events
    LinkCreated,
    LinkBlocked,
    LinksExpired,

    // Recipient-side events
    OtpIssued,

    // Side channels
    NotificationFailed,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// User who triggered the event (if known).
    pub user_id: Option<String>,
    /// Resource affected (file id, link token prefix, ...).
    pub resource_id: Option<String>,
    /// Resource type (file, link, ...).
    pub resource_type: Option<String>,
    pub ip_address: Option<String>,
    pub details: Option<serde_json::Value>,
    pub success: bool,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            resource_id: None,
            resource_type: None,
            ip_address: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    storage: &'a BlobStorage,
}

impl<'a> AuditRepository<'a> {
    pub fn new(storage: &'a BlobStorage) -> Self {
        Self { storage }
    }

    /// Append an event to its day's JSONL file.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.storage.paths().audit_events_file(&date);

        let event_json = serde_json::to_vec(event).map_err(|e| {
            StorageError::SerializationError(format!("Failed to serialize audit event: {e}"))
        })?;

        self.storage.append_line(&path, &event_json)
    }

    /// Read audit events for a specific date.
    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        let path = self.storage.paths().audit_events_file(date);
        let content = self.storage.read_raw(&path)?;

        let content_str = String::from_utf8(content).map_err(|e| {
            StorageError::SerializationError(format!("Invalid UTF-8 in audit log: {e}"))
        })?;

        let mut events = Vec::new();
        for line in content_str.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let event: AuditEvent = serde_json::from_str(line).map_err(|e| {
                StorageError::SerializationError(format!(
                    "Failed to deserialize audit event: {e}"
                ))
            })?;
            events.push(event);
        }

        Ok(events)
    }
}

/// Log an audit event, warning instead of failing when the write fails.
#[macro_export]
macro_rules! audit_log {
    ($storage:expr, $event:expr) => {{
        let repo = $crate::storage::AuditRepository::new($storage);
        let event = $event;
        if let Err(e) = repo.log(&event) {
            tracing::warn!(event_type = ?event.event_type, error = %e, "Failed to write audit event");
        }
    }};
    ($storage:expr, $event_type:expr, $user_id:expr, $resource_type:expr, $resource_id:expr) => {{
        $crate::audit_log!(
            $storage,
            $crate::storage::AuditEvent::new($event_type)
                .with_user($user_id)
                .with_resource($resource_type, $resource_id)
        )
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn setup() -> (TempDir, BlobStorage) {
        let temp = TempDir::new().unwrap();
        let mut storage = BlobStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, storage)
    }

    #[test]
    fn create_audit_event() {
        let event = AuditEvent::new(AuditEventType::LinkCreated)
            .with_user("user_123")
            .with_resource("link", "abcdefgh")
            .with_ip("192.168.1.1");

        assert_eq!(event.event_type, AuditEventType::LinkCreated);
        assert_eq!(event.user_id, Some("user_123".to_string()));
        assert_eq!(event.resource_type, Some("link".to_string()));
        assert_eq!(event.ip_address, Some("192.168.1.1".to_string()));
        assert!(event.success);
    }

    #[test]
    fn failed_event() {
        let event = AuditEvent::new(AuditEventType::NotificationFailed)
            .with_user("owner")
            .failed("webhook returned 502");

        assert!(!event.success);
        assert_eq!(event.error, Some("webhook returned 502".to_string()));
    }

    #[test]
    fn log_and_read_events() {
        let (_temp, storage) = setup();
        let repo = AuditRepository::new(&storage);

        repo.log(
            &AuditEvent::new(AuditEventType::FileUploaded)
                .with_user("user_1")
                .with_resource("file", "f1"),
        )
        .unwrap();
        repo.log(
            &AuditEvent::new(AuditEventType::OtpIssued).with_resource("link", "abcdefgh"),
        )
        .unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = repo.read_events(&today).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::FileUploaded);
        assert_eq!(events[1].event_type, AuditEventType::OtpIssued);
    }

    #[test]
    fn events_land_in_their_own_day() {
        let (_temp, storage) = setup();
        let repo = AuditRepository::new(&storage);
        let when = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        repo.log(&AuditEvent::new(AuditEventType::LinkBlocked).at(when))
            .unwrap();

        assert_eq!(repo.read_events("2026-03-01").unwrap().len(), 1);
        assert!(repo.read_events("2026-03-02").is_err());
    }

    #[test]
    fn macro_logs_event() {
        let (_temp, storage) = setup();
        crate::audit_log!(&storage, AuditEventType::FileDeleted, "user_1", "file", "f1");

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = AuditRepository::new(&storage).read_events(&today).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].resource_id.as_deref(), Some("f1"));
    }
}
