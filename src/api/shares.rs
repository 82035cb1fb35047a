// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Share link endpoints (owner side).

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    audit_log,
    auth::Auth,
    crypto::codes::token_prefix,
    engine::{
        registry::{DEFAULT_DOWNLOAD_LIMIT, DEFAULT_EXPIRY_HOURS},
        NewLink, OwnedLink,
    },
    error::ApiError,
    models::LinkStatus,
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateShareRequest {
    pub file_id: String,
    pub password: String,
    /// Defaults to 24.
    #[serde(default)]
    pub expiry_hours: Option<i64>,
    /// Defaults to 10.
    #[serde(default)]
    pub download_limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateShareResponse {
    pub link_token: String,
    /// Recipient-facing URL carrying the token.
    pub share_url: String,
    pub expiry_date: DateTime<Utc>,
    pub download_limit: u32,
}

/// A link as shown to its owner. The password hash is never included.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LinkView {
    pub link_token: String,
    pub file_id: String,
    /// `None` once the file was deleted.
    pub filename: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub download_limit: u32,
    pub downloads_consumed: u32,
    pub status: LinkStatus,
}

impl LinkView {
    fn new(owned: OwnedLink, now: DateTime<Utc>) -> Self {
        let status = owned.link.status(now);
        let link = owned.link;
        Self {
            link_token: link.token,
            file_id: link.file_id,
            filename: owned.filename,
            created_at: link.created_at,
            expiry_date: link.expires_at,
            download_limit: link.download_limit,
            downloads_consumed: link.downloads_consumed,
            status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LinkListResponse {
    pub links: Vec<LinkView>,
}

/// Create a password-protected share link for an owned file.
#[utoipa::path(
    post,
    path = "/api/share/create",
    tag = "Shares",
    security(("bearer_auth" = [])),
    request_body = CreateShareRequest,
    responses(
        (status = 201, description = "Link created", body = CreateShareResponse),
        (status = 400, description = "Invalid expiry, limit or password"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "File not found")
    )
)]
pub async fn create_share(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateShareRequest>,
) -> Result<(StatusCode, Json<CreateShareResponse>), ApiError> {
    let link = state
        .engine
        .links
        .create(
            &user.user_id,
            NewLink {
                file_id: request.file_id,
                password: request.password,
                expiry_hours: request.expiry_hours.unwrap_or(DEFAULT_EXPIRY_HOURS),
                download_limit: request.download_limit.unwrap_or(DEFAULT_DOWNLOAD_LIMIT),
            },
        )
        .await?;

    audit_log!(
        state.storage(),
        AuditEvent::new(AuditEventType::LinkCreated)
            .with_user(&user.user_id)
            .with_resource("link", token_prefix(&link.token))
            .with_details(serde_json::json!({
                "file_id": link.file_id,
                "expires_at": link.expires_at,
                "download_limit": link.download_limit,
            }))
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateShareResponse {
            share_url: state.config.share_url(&link.token),
            link_token: link.token,
            expiry_date: link.expires_at,
            download_limit: link.download_limit,
        }),
    ))
}

/// List the caller's share links, newest first.
#[utoipa::path(
    get,
    path = "/api/share/links",
    tag = "Shares",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Owned links", body = LinkListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_links(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<LinkListResponse>, ApiError> {
    let now = state.engine.clock().now();
    let links = state
        .engine
        .owner_links(&user.user_id)?
        .into_iter()
        .map(|owned| LinkView::new(owned, now))
        .collect();
    Ok(Json(LinkListResponse { links }))
}
