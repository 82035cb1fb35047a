// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token claims and the authenticated owner.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Claims read from an account-service token.
///
/// `aud` is validated by `jsonwebtoken` and never read here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the canonical account id.
    pub sub: String,

    #[serde(default)]
    pub exp: i64,

    #[serde(default)]
    pub iat: i64,

    #[serde(default)]
    pub iss: String,

    /// Contact address OTP codes and alerts are routed to.
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub sid: Option<String>,
}

/// Authenticated owner making a request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Owner id (`sub` claim).
    pub user_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(skip)]
    pub issuer: String,

    /// Unix timestamp.
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email.filter(|e| !e.trim().is_empty()),
            session_id: claims.sid,
            issuer: claims.iss,
            expires_at: claims.exp,
        }
    }

    /// Contact stored on uploaded assets.
    pub fn contact(&self) -> Option<&str> {
        self.email.as_deref()
    }
}
