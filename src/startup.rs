// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process start-up: logging, master key, notifier and application state.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use zeroize::Zeroizing;

use crate::auth::AuthError;
use crate::clock::SystemClock;
use crate::config::{Config, LOG_FORMAT_ENV};
use crate::crypto::{SecretKey, Vault, VaultError};
use crate::engine::Engine;
use crate::notify::webhook::WebhookNotifier;
use crate::notify::{LogNotifier, NotificationError, Notifier};
use crate::state::{AppState, AuthConfig};
use crate::storage::{BlobStorage, DatabaseError, ShareDatabase, StorageError, StoragePaths};

const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("database: {0}")]
    Database(#[from] DatabaseError),

    #[error("master key: {0}")]
    MasterKey(#[from] VaultError),

    #[error("notifier: {0}")]
    Notifier(#[from] NotificationError),

    #[error("authentication: {0}")]
    Auth(#[from] AuthError),
}

/// `LOG_FORMAT=json` for structured output, anything else for pretty logs.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        fmt().with_env_filter(filter).json().with_current_span(false).init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

/// Master key from `MASTER_KEY`, else from the key file, else freshly
/// generated and written to the key file.
pub fn load_master_key(config: &Config, storage: &BlobStorage) -> Result<SecretKey, StartupError> {
    if let Some(hex_key) = &config.master_key_hex {
        info!("Using master key from environment");
        return Ok(SecretKey::from_hex(hex_key.trim())?);
    }

    let path = storage.paths().master_key();
    if storage.exists(&path) {
        let raw = Zeroizing::new(storage.read_raw(&path)?);
        let text = String::from_utf8_lossy(&raw);
        let key = SecretKey::from_hex(text.trim())?;
        info!(path = %path.display(), "Loaded master key file");
        return Ok(key);
    }

    let key = SecretKey::generate();
    let hex_key = Zeroizing::new(key.to_hex());
    storage.write_raw(&path, hex_key.as_bytes())?;
    restrict_permissions(&path);
    warn!(
        path = %path.display(),
        "Generated a new master key; back it up, sealed files are unreadable without it"
    );
    Ok(key)
}

#[cfg(unix)]
fn restrict_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        warn!(error = %e, "Could not restrict master key file permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &std::path::Path) {}

pub fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>, StartupError> {
    match &config.notify_webhook_url {
        Some(url) => {
            let notifier = WebhookNotifier::new(url.clone())?;
            info!(url = %notifier.url(), "Owner notifications via webhook");
            Ok(Arc::new(notifier))
        }
        None => {
            warn!("NOTIFY_WEBHOOK_URL not set; owner notifications are only logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// Open storage and the record database and wire the engine.
pub fn build_state(config: Config) -> Result<AppState, StartupError> {
    let paths = StoragePaths::new(&config.data_dir);
    let mut storage = BlobStorage::new(paths.clone());
    storage.initialize()?;

    let db = Arc::new(ShareDatabase::open(&paths.database())?);
    let vault = Vault::new(load_master_key(&config, &storage)?);
    let notifier = build_notifier(&config)?;
    let auth_config = AuthConfig::from_config(&config)?;

    info!(
        data_dir = %config.data_dir.display(),
        access_policy = ?config.access_policy,
        auth_mode = auth_config.mode(),
        "Storage and database ready"
    );
    if auth_config.mode() == "unverified" {
        if cfg!(feature = "dev") {
            warn!("DEV: owner tokens are accepted without signature verification");
        } else {
            warn!("No AUTH_JWKS_URL or AUTH_HS256_SECRET; owner endpoints will answer 503");
        }
    }

    let engine = Engine::new(
        db,
        storage.clone(),
        vault,
        notifier,
        Arc::new(SystemClock),
        config.access_policy,
    );

    Ok(AppState::new(config, engine, storage).with_auth_config(auth_config))
}
