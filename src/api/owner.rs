// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Owner actions on intrusion reports.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    audit_log,
    auth::Auth,
    crypto::codes::token_prefix,
    engine::{BlockOutcome, BlockTarget},
    error::ApiError,
    models::OwnerActionKind,
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

/// Exactly one of `attempt_id` and `link_token` must be set.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OwnerActionRequest {
    #[serde(default)]
    pub attempt_id: Option<String>,
    #[serde(default)]
    pub link_token: Option<String>,
    /// Only `block` is supported.
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OwnerActionResponse {
    pub message: String,
    pub action: OwnerActionKind,
    pub link_token: String,
    /// True when the link had been blocked before this request.
    pub already_blocked: bool,
}

impl OwnerActionRequest {
    fn target(self) -> Result<(OwnerActionKind, BlockTarget), ApiError> {
        let action = match self.action.trim().to_ascii_lowercase().as_str() {
            "block" => OwnerActionKind::Block,
            other => return Err(ApiError::bad_request(format!("Unsupported action: {other}"))),
        };
        let target = match (self.attempt_id, self.link_token) {
            (Some(attempt_id), None) => BlockTarget::Attempt(attempt_id),
            (None, Some(link_token)) => BlockTarget::Link(link_token),
            _ => {
                return Err(ApiError::bad_request(
                    "Provide exactly one of attempt_id or link_token",
                ))
            }
        };
        Ok((action, target))
    }
}

/// Block the link behind an access attempt (or a link directly).
#[utoipa::path(
    post,
    path = "/api/owner/action",
    tag = "Owner",
    security(("bearer_auth" = [])),
    request_body = OwnerActionRequest,
    responses(
        (status = 200, description = "Action applied", body = OwnerActionResponse),
        (status = 400, description = "Invalid action or target"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Target belongs to another owner"),
        (status = 404, description = "Attempt or link not found")
    )
)]
pub async fn owner_action(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<OwnerActionRequest>,
) -> Result<Json<OwnerActionResponse>, ApiError> {
    let (action, target) = request.target()?;
    let detail = match &target {
        BlockTarget::Attempt(id) => serde_json::json!({ "attempt_id": id }),
        BlockTarget::Link(_) => serde_json::json!({ "target": "link" }),
    };

    let outcome = state.engine.audit.block(target, &user.user_id)?;
    let already_blocked = matches!(outcome, BlockOutcome::AlreadyBlocked { .. });

    if !already_blocked {
        audit_log!(
            state.storage(),
            AuditEvent::new(AuditEventType::LinkBlocked)
                .with_user(&user.user_id)
                .with_resource("link", token_prefix(outcome.link_token()))
                .with_details(detail)
        );
    }

    Ok(Json(OwnerActionResponse {
        message: if already_blocked {
            "Link was already blocked".to_string()
        } else {
            "Link blocked".to_string()
        },
        action,
        link_token: outcome.link_token().to_string(),
        already_blocked,
    }))
}
