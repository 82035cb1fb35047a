// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated owners.
//!
//! ```rust,ignore
//! async fn list_files(Auth(user): Auth, State(state): State<AppState>) -> ... {
//!     // user.user_id is the owner id
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Validation};

use super::claims::Claims;
use super::{AuthError, AuthenticatedUser};
use crate::state::{AppState, AuthConfig};

/// Clock skew tolerance in seconds.
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Rejects with 401 unless the request carries a valid owner token.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let token = bearer_token(&parts.headers)?;
        let user = verify_bearer(token, &state.auth_config).await?;
        Ok(Auth(user))
    }
}

/// Token part of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

pub async fn verify_bearer(token: &str, config: &AuthConfig) -> Result<AuthenticatedUser, AuthError> {
    if let Some(jwks) = &config.jwks {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        let (key, algorithm) = jwks.decoding_key(header.kid.as_deref()).await?;
        return verify_signed(token, &key, algorithm, config);
    }

    if let Some(secret) = &config.hs256_secret {
        let key = DecodingKey::from_secret(secret.as_bytes());
        return verify_signed(token, &key, Algorithm::HS256, config);
    }

    verify_unsigned(token)
}

fn verify_signed(
    token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
    config: &AuthConfig,
) -> Result<AuthenticatedUser, AuthError> {
    let mut validation = Validation::new(algorithm);
    validation.leeway = CLOCK_SKEW_LEEWAY;
    validation.set_required_spec_claims(&["exp", "sub"]);

    if let Some(issuer) = &config.issuer {
        validation.set_issuer(&[issuer]);
    }
    match &config.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }

    let data = decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::InvalidAudience => AuthError::InvalidAudience,
        ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
        _ => AuthError::MalformedToken,
    })?;

    Ok(AuthenticatedUser::from_claims(data.claims))
}

/// Structure and expiry only. Test and `dev` builds.
#[cfg(any(test, feature = "dev"))]
fn verify_unsigned(token: &str) -> Result<AuthenticatedUser, AuthError> {
    let data = jsonwebtoken::dangerous::insecure_decode::<Claims>(token)
        .map_err(|_| AuthError::MalformedToken)?;
    let claims = data.claims;

    let now = chrono::Utc::now().timestamp();
    if claims.exp > 0 && claims.exp < now - CLOCK_SKEW_LEEWAY as i64 {
        return Err(AuthError::TokenExpired);
    }

    Ok(AuthenticatedUser::from_claims(claims))
}

#[cfg(not(any(test, feature = "dev")))]
fn verify_unsigned(_token: &str) -> Result<AuthenticatedUser, AuthError> {
    Err(AuthError::NotConfigured)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    pub const SECRET: &str = "test-shared-secret";

    fn claims(sub: &str, exp_offset: i64) -> Claims {
        let now = chrono::Utc::now().timestamp();
        Claims {
            sub: sub.to_string(),
            exp: now + exp_offset,
            iat: now,
            iss: "https://accounts.example.com".to_string(),
            email: Some(format!("{sub}@example.com")),
            sid: None,
        }
    }

    /// HS256 token signed with [`SECRET`].
    pub fn signed_token(sub: &str) -> String {
        encode(
            &Header::default(),
            &claims(sub, 3600),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    /// Unsigned token accepted when no verifier is configured.
    pub fn unsigned_token(sub: &str) -> String {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims(sub, 3600)).unwrap());
        format!("{header}.{body}.fake_signature")
    }

    fn hs256() -> AuthConfig {
        AuthConfig {
            hs256_secret: Some(SECRET.to_string()),
            issuer: Some("https://accounts.example.com".to_string()),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(AuthError::MissingAuthHeader)));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(bearer_token(&headers), Err(AuthError::InvalidAuthHeader)));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[tokio::test]
    async fn hs256_token_verifies() {
        let user = verify_bearer(&signed_token("owner-1"), &hs256()).await.unwrap();
        assert_eq!(user.user_id, "owner-1");
        assert_eq!(user.contact(), Some("owner-1@example.com"));
    }

    #[tokio::test]
    async fn hs256_rejects_other_secret() {
        let config = AuthConfig {
            hs256_secret: Some("another-secret".to_string()),
            ..AuthConfig::default()
        };
        let result = verify_bearer(&signed_token("owner-1"), &config).await;
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[tokio::test]
    async fn hs256_rejects_expired_and_foreign_issuer() {
        let expired = encode(
            &Header::default(),
            &claims("owner-1", -3600),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            verify_bearer(&expired, &hs256()).await,
            Err(AuthError::TokenExpired)
        ));

        let config = AuthConfig {
            issuer: Some("https://other.example.com".to_string()),
            ..hs256()
        };
        assert!(matches!(
            verify_bearer(&signed_token("owner-1"), &config).await,
            Err(AuthError::InvalidIssuer)
        ));
    }

    #[tokio::test]
    async fn unsigned_token_accepted_without_verifier() {
        let user = verify_bearer(&unsigned_token("owner-2"), &AuthConfig::default())
            .await
            .unwrap();
        assert_eq!(user.user_id, "owner-2");
    }

    #[tokio::test]
    async fn unsigned_token_rejected_by_hs256() {
        let result = verify_bearer(&unsigned_token("owner-2"), &hs256()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn garbage_is_malformed() {
        let result = verify_bearer("not-a-jwt", &AuthConfig::default()).await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }
}
