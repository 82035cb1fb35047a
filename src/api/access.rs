// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Recipient access endpoints and the owner's attempt log.
//!
//! The access endpoints are unauthenticated. A wrong password is answered
//! with the decoy in exactly the shape a correct one gets; unknown, expired,
//! exhausted and blocked links are all the same 404.

use axum::{extract::State, response::Response, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::client::ClientAddr;
use super::response::payload_response;
use crate::{
    audit_log,
    auth::Auth,
    crypto::codes::token_prefix,
    error::ApiError,
    models::{AccessAttempt, ServedPayload},
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccessFileRequest {
    pub link_token: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RequestOtpRequest {
    pub link_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RequestOtpResponse {
    pub message: String,
    /// Masked owner contact, e.g. `ali***@example.com`.
    pub owner_email_hint: String,
    /// Seconds until the code expires.
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub link_token: String,
    pub otp: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttemptView {
    pub attempt_id: String,
    pub link_token: String,
    pub file_id: String,
    pub filename: String,
    pub attempted_at: DateTime<Utc>,
    /// `null` when the password was never compared.
    pub password_correct: Option<bool>,
    pub file_type_served: ServedPayload,
    pub ip_address: String,
    /// Present on decoy attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
    /// Present when the OTP flow was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_verified: Option<bool>,
}

impl From<AccessAttempt> for AttemptView {
    fn from(a: AccessAttempt) -> Self {
        Self {
            attempt_id: a.id,
            link_token: a.link_token,
            file_id: a.file_id,
            filename: a.filename,
            attempted_at: a.attempted_at,
            password_correct: a.password_correct,
            file_type_served: a.file_type_served,
            ip_address: a.ip_address,
            verification_code: a.verification_code,
            otp_verified: a.otp_verified,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttemptListResponse {
    pub attempts: Vec<AttemptView>,
}

/// Download through a share link with its password.
#[utoipa::path(
    post,
    path = "/api/access/file",
    tag = "Access",
    request_body = AccessFileRequest,
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 400, description = "Password-only access disabled"),
        (status = 404, description = "Link not found")
    )
)]
pub async fn access_file(
    State(state): State<AppState>,
    ClientAddr(ip): ClientAddr,
    Json(request): Json<AccessFileRequest>,
) -> Result<Response, ApiError> {
    let payload = state
        .engine
        .access_with_password(&request.link_token, &request.password, &ip)
        .await?;
    Ok(payload_response(payload))
}

/// Ask for a one-time code. The code goes to the owner, never to the caller.
#[utoipa::path(
    post,
    path = "/api/access/request-otp",
    tag = "Access",
    request_body = RequestOtpRequest,
    responses(
        (status = 200, description = "Code sent to the owner", body = RequestOtpResponse),
        (status = 404, description = "Link not found")
    )
)]
pub async fn request_otp(
    State(state): State<AppState>,
    ClientAddr(ip): ClientAddr,
    Json(request): Json<RequestOtpRequest>,
) -> Result<Json<RequestOtpResponse>, ApiError> {
    let requested = state.engine.request_otp(&request.link_token)?;

    audit_log!(
        state.storage(),
        AuditEvent::new(AuditEventType::OtpIssued)
            .with_resource("link", token_prefix(&request.link_token))
            .with_ip(&ip)
    );

    Ok(Json(RequestOtpResponse {
        message: "Access code sent to the file owner. Ask them to share it with you.".to_string(),
        owner_email_hint: requested.owner_email_hint,
        expires_in: requested.expires_in,
    }))
}

/// Download with an owner-relayed code and the link password.
#[utoipa::path(
    post,
    path = "/api/access/verify-otp",
    tag = "Access",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 400, description = "Invalid or expired OTP"),
        (status = 404, description = "Link not found")
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    ClientAddr(ip): ClientAddr,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Response, ApiError> {
    let payload = state
        .engine
        .access_with_otp(&request.link_token, &request.otp, &request.password, &ip)
        .await?;
    Ok(payload_response(payload))
}

/// Access attempts against the caller's links, newest first.
#[utoipa::path(
    get,
    path = "/api/access/attempts",
    tag = "Access",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Attempt log", body = AttemptListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_attempts(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<AttemptListResponse>, ApiError> {
    let attempts = state
        .engine
        .audit
        .list(&user.user_id)?
        .into_iter()
        .map(AttemptView::from)
        .collect();
    Ok(Json(AttemptListResponse { attempts }))
}
