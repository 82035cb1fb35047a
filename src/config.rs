// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup into [`Config`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for blobs, database and audit logs | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `PUBLIC_BASE_URL` | Base URL used to build share URLs | `http://localhost:3000` |
//! | `MASTER_KEY` | 64 hex chars wrapping per-file data keys | generated under `DATA_DIR` |
//! | `AUTH_JWKS_URL` | JWKS endpoint of the account service | Optional |
//! | `AUTH_HS256_SECRET` | Shared secret for HS256 bearer tokens | Optional |
//! | `AUTH_ISSUER` | Expected JWT issuer claim | Optional |
//! | `AUTH_AUDIENCE` | Expected JWT audience claim | Optional |
//! | `NOTIFY_WEBHOOK_URL` | Email/SMS collaborator endpoint | log-only notifier |
//! | `ACCESS_POLICY` | `both` or `otp_only` | `both` |
//! | `TRUST_FORWARDED_FOR` | Use `X-Forwarded-For` as client address | `false` |
//! | `MAX_UPLOAD_BYTES` | Upper bound for a multipart upload | `104857600` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::path::PathBuf;

use url::Url;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const PUBLIC_BASE_URL_ENV: &str = "PUBLIC_BASE_URL";
/// Hex-encoded 256-bit key that wraps every per-file data key.
pub const MASTER_KEY_ENV: &str = "MASTER_KEY";
pub const AUTH_JWKS_URL_ENV: &str = "AUTH_JWKS_URL";
pub const AUTH_HS256_SECRET_ENV: &str = "AUTH_HS256_SECRET";
pub const AUTH_ISSUER_ENV: &str = "AUTH_ISSUER";
pub const AUTH_AUDIENCE_ENV: &str = "AUTH_AUDIENCE";
pub const NOTIFY_WEBHOOK_URL_ENV: &str = "NOTIFY_WEBHOOK_URL";
pub const ACCESS_POLICY_ENV: &str = "ACCESS_POLICY";
pub const TRUST_FORWARDED_FOR_ENV: &str = "TRUST_FORWARDED_FOR";
pub const MAX_UPLOAD_BYTES_ENV: &str = "MAX_UPLOAD_BYTES";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Which recipient flows are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessPolicy {
    /// Password-only (`/access/file`) and owner-mediated OTP flows.
    #[default]
    Both,
    /// Only the OTP flow; `/access/file` is refused.
    OtpOnly,
}

impl AccessPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "both" => Some(AccessPolicy::Both),
            "otp_only" | "otp-only" | "otp" => Some(AccessPolicy::OtpOnly),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Settings resolved from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub public_base_url: Url,
    pub master_key_hex: Option<String>,
    pub jwks_url: Option<String>,
    pub hs256_secret: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub notify_webhook_url: Option<String>,
    pub access_policy: AccessPolicy,
    pub trust_forwarded_for: bool,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            public_base_url: default_base_url(),
            master_key_hex: None,
            jwks_url: None,
            hs256_secret: None,
            issuer: None,
            audience: None,
            notify_webhook_url: None,
            access_policy: AccessPolicy::Both,
            trust_forwarded_for: false,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

fn default_base_url() -> Url {
    // Constant input, parsing cannot fail.
    Url::parse(DEFAULT_PUBLIC_BASE_URL).unwrap_or_else(|_| unreachable!())
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(non_empty)
    }

    /// Load the configuration through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let port = match lookup(PORT_ENV) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: PORT_ENV,
                reason: format!("'{raw}' is not a port number"),
            })?,
            None => defaults.port,
        };

        let public_base_url = match lookup(PUBLIC_BASE_URL_ENV) {
            Some(raw) => Url::parse(&raw).map_err(|e| ConfigError::Invalid {
                name: PUBLIC_BASE_URL_ENV,
                reason: e.to_string(),
            })?,
            None => defaults.public_base_url,
        };

        let access_policy = match lookup(ACCESS_POLICY_ENV) {
            Some(raw) => AccessPolicy::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                name: ACCESS_POLICY_ENV,
                reason: format!("'{raw}' is neither 'both' nor 'otp_only'"),
            })?,
            None => defaults.access_policy,
        };

        let max_upload_bytes = match lookup(MAX_UPLOAD_BYTES_ENV) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: MAX_UPLOAD_BYTES_ENV,
                reason: format!("'{raw}' is not a byte count"),
            })?,
            None => defaults.max_upload_bytes,
        };

        let trust_forwarded_for = lookup(TRUST_FORWARDED_FOR_ENV)
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            data_dir: lookup(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            host: lookup(HOST_ENV).unwrap_or(defaults.host),
            port,
            public_base_url,
            master_key_hex: lookup(MASTER_KEY_ENV),
            jwks_url: lookup(AUTH_JWKS_URL_ENV),
            hs256_secret: lookup(AUTH_HS256_SECRET_ENV),
            issuer: lookup(AUTH_ISSUER_ENV),
            audience: lookup(AUTH_AUDIENCE_ENV),
            notify_webhook_url: lookup(NOTIFY_WEBHOOK_URL_ENV),
            access_policy,
            trust_forwarded_for,
            max_upload_bytes,
        })
    }

    /// Public URL a recipient opens for the given link token.
    pub fn share_url(&self, link_token: &str) -> String {
        let base = self.public_base_url.as_str().trim_end_matches('/');
        format!("{base}/access/{link_token}")
    }
}
