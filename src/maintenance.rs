// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Maintenance Sweeper
//!
//! Background task that keeps stored state tidy. Expiry is always enforced at
//! access time; the sweeper only makes stored state match it.
//!
//! Every `interval` (default 60 s) it:
//! 1. Drops OTP challenges that are consumed or past their expiry.
//! 2. Deactivates links whose expiry has passed and records the count in the
//!    operational audit log.
//!
//! Stops when its `CancellationToken` is cancelled.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::audit_log;
use crate::engine::{Engine, SweepReport};
use crate::storage::{AuditEvent, AuditEventType, BlobStorage};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

pub struct MaintenanceSweeper {
    engine: Engine,
    storage: BlobStorage,
    interval: Duration,
}

impl MaintenanceSweeper {
    pub fn new(engine: Engine, storage: BlobStorage) -> Self {
        Self {
            engine,
            storage,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Maintenance sweeper starting");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            self.sweep_once();

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => break,
            }
        }

        info!("Maintenance sweeper shutting down");
    }

    /// One sweep. Failures are logged and retried on the next tick.
    pub fn sweep_once(&self) -> Option<SweepReport> {
        match self.engine.sweep() {
            Ok(report) => {
                if report.links_expired > 0 {
                    audit_log!(
                        &self.storage,
                        AuditEvent::new(AuditEventType::LinksExpired)
                            .with_details(serde_json::json!({ "count": report.links_expired }))
                    );
                }
                Some(report)
            }
            Err(e) => {
                warn!(error = %e, "Maintenance sweep failed");
                None
            }
        }
    }
}
