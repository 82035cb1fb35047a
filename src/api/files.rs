// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File asset endpoints.
//!
//! Owners upload a real file together with its decoy, list and delete their
//! assets, and download the real payload. All operations require
//! authentication and enforce ownership; another owner's asset is a 404.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::response::payload_response;
use crate::{
    audit_log,
    auth::Auth,
    engine::NewPayload,
    error::ApiError,
    models::FileAsset,
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

pub const REAL_FIELD: &str = "real_file";
pub const DECOY_FIELD: &str = "decoy_file";

/// File asset metadata. Key material and blob locations are never exposed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileView {
    pub file_id: String,
    pub filename: String,
    pub decoy_filename: String,
    /// Plaintext size of the real file in bytes.
    pub size: u64,
    pub decoy_size: u64,
    pub uploaded_at: DateTime<Utc>,
}

impl From<FileAsset> for FileView {
    fn from(asset: FileAsset) -> Self {
        Self {
            file_id: asset.id,
            filename: asset.filename,
            decoy_filename: asset.decoy_filename,
            size: asset.size,
            decoy_size: asset.decoy_size,
            uploaded_at: asset.uploaded_at,
        }
    }
}

/// Multipart form of an upload (documentation only).
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub real_file: Vec<u8>,
    #[schema(value_type = String, format = Binary)]
    pub decoy_file: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub file: FileView,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileListResponse {
    pub files: Vec<FileView>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteFileResponse {
    pub message: String,
    pub file_id: String,
    /// Links that were still active and are now unusable.
    pub links_deactivated: usize,
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::new(e.status(), e.body_text())
}

/// Upload a real file and its decoy.
///
/// Both parts are sealed under a fresh per-asset key before anything
/// reaches disk.
#[utoipa::path(
    post,
    path = "/api/files/upload",
    tag = "Files",
    security(("bearer_auth" = [])),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File and decoy stored", body = UploadResponse),
        (status = 400, description = "Missing part or invalid filename"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "Upload too large")
    )
)]
pub async fn upload_file(
    Auth(user): Auth,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let mut real: Option<NewPayload> = None;
    let mut decoy: Option<NewPayload> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let slot = match field.name() {
            Some(REAL_FIELD) => &mut real,
            Some(DECOY_FIELD) => &mut decoy,
            _ => continue,
        };
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("Each file part needs a filename"))?;
        let bytes = field.bytes().await.map_err(multipart_error)?;
        *slot = Some(NewPayload {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    let real = real.ok_or_else(|| ApiError::bad_request("Missing real_file part"))?;
    let decoy = decoy.ok_or_else(|| ApiError::bad_request("Missing decoy_file part"))?;

    let asset = state
        .engine
        .files
        .upload(&user.user_id, user.contact(), real, decoy)
        .await?;

    audit_log!(
        state.storage(),
        AuditEventType::FileUploaded,
        &user.user_id,
        "file",
        &asset.id
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            file: FileView::from(asset),
            message: "File uploaded successfully".to_string(),
        }),
    ))
}

/// List the caller's file assets, newest first.
#[utoipa::path(
    get,
    path = "/api/files",
    tag = "Files",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Owned files", body = FileListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_files(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<FileListResponse>, ApiError> {
    let files: Vec<FileView> = state
        .engine
        .files
        .list(&user.user_id)?
        .into_iter()
        .map(FileView::from)
        .collect();
    let total = files.len();
    Ok(Json(FileListResponse { files, total }))
}

/// Download the real payload of an owned asset.
#[utoipa::path(
    get,
    path = "/api/files/{file_id}/download",
    tag = "Files",
    security(("bearer_auth" = [])),
    params(("file_id" = String, Path, description = "File asset id")),
    responses(
        (status = 200, description = "Real file", content_type = "application/octet-stream"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "File not found")
    )
)]
pub async fn download_file(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    let payload = state.engine.files.download_real(&user.user_id, &file_id).await?;

    audit_log!(
        state.storage(),
        AuditEventType::OwnerDownload,
        &user.user_id,
        "file",
        &file_id
    );

    Ok(payload_response(payload))
}

/// Delete an owned asset and deactivate every link pointing to it.
#[utoipa::path(
    delete,
    path = "/api/files/{file_id}",
    tag = "Files",
    security(("bearer_auth" = [])),
    params(("file_id" = String, Path, description = "File asset id")),
    responses(
        (status = 200, description = "File deleted", body = DeleteFileResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "File not found")
    )
)]
pub async fn delete_file(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<DeleteFileResponse>, ApiError> {
    let links_deactivated = state.engine.files.delete(&user.user_id, &file_id)?;

    audit_log!(
        state.storage(),
        AuditEvent::new(AuditEventType::FileDeleted)
            .with_user(&user.user_id)
            .with_resource("file", &file_id)
            .with_details(serde_json::json!({ "links_deactivated": links_deactivated }))
    );

    Ok(Json(DeleteFileResponse {
        message: "File deleted successfully".to_string(),
        file_id,
        links_deactivated,
    }))
}
