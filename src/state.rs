// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{AuthError, JwksManager};
use crate::config::Config;
use crate::engine::Engine;
use crate::storage::BlobStorage;

/// How owner bearer tokens are verified.
///
/// JWKS wins over the shared secret when both are set. With neither, owner
/// endpoints answer 503 except in test and `dev` builds, which decode
/// tokens without a signature check.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub jwks: Option<Arc<JwksManager>>,
    pub hs256_secret: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl AuthConfig {
    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        let jwks = match &config.jwks_url {
            Some(url) => Some(Arc::new(JwksManager::new(url.clone())?)),
            None => None,
        };
        Ok(Self {
            jwks,
            hs256_secret: config.hs256_secret.clone(),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        })
    }

    pub fn mode(&self) -> &'static str {
        if self.jwks.is_some() {
            "jwks"
        } else if self.hs256_secret.is_some() {
            "hs256"
        } else {
            "unverified"
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Engine,
    pub storage: BlobStorage,
    pub auth_config: AuthConfig,
}

impl AppState {
    pub fn new(config: Config, engine: Engine, storage: BlobStorage) -> Self {
        Self {
            config: Arc::new(config),
            engine,
            storage,
            auth_config: AuthConfig::default(),
        }
    }

    pub fn with_auth_config(mut self, auth_config: AuthConfig) -> Self {
        self.auth_config = auth_config;
        self
    }

    pub fn storage(&self) -> &BlobStorage {
        &self.storage
    }
}
