// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Notifier that hands messages to an external email/SMS collaborator.
//!
//! Each [`Notification`] is POSTed as JSON (tagged by `kind`) to the
//! configured endpoint. Any non-2xx status counts as a failed delivery.

use std::time::Duration;

use async_trait::async_trait;

use super::{Notification, NotificationError, Notifier};

/// Request timeout for one delivery.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Rejected(status.as_u16()));
        }

        tracing::debug!(kind = notification.kind(), status = status.as_u16(), "Webhook accepted notification");
        Ok(())
    }
}

impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("url", &self.url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn builds_with_url() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/notify").unwrap();
        assert_eq!(notifier.url(), "http://127.0.0.1:9/notify");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        // Port 9 (discard) is not listening in test environments.
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/notify").unwrap();
        let result = notifier
            .send(&Notification::AuthorizedAccess {
                owner_id: "owner".to_string(),
                contact: None,
                filename: "a.txt".to_string(),
                accessed_at: Utc::now(),
                ip_address: "unknown".to_string(),
                otp_verified: None,
            })
            .await;
        assert!(matches!(result, Err(NotificationError::Transport(_))));
    }
}
