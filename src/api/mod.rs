// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{LinkStatus, OwnerActionKind, PayloadClass, ServedPayload},
    state::AppState,
};

pub mod access;
pub mod client;
pub mod files;
pub mod health;
pub mod owner;
pub mod response;
pub mod shares;

pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    let api_routes = Router::new()
        .route(
            "/files/upload",
            post(files::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files", get(files::list_files))
        .route("/files/{file_id}", delete(files::delete_file))
        .route("/files/{file_id}/download", get(files::download_file))
        .route("/share/create", post(shares::create_share))
        .route("/share/links", get(shares::list_links))
        .route("/access/file", post(access::access_file))
        .route("/access/request-otp", post(access::request_otp))
        .route("/access/verify-otp", post(access::verify_otp))
        .route("/access/attempts", get(access::list_attempts))
        .route("/owner/action", post(owner::owner_action));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        files::upload_file,
        files::list_files,
        files::download_file,
        files::delete_file,
        shares::create_share,
        shares::list_links,
        access::access_file,
        access::request_otp,
        access::verify_otp,
        access::list_attempts,
        owner::owner_action
    ),
    components(
        schemas(
            PayloadClass,
            ServedPayload,
            LinkStatus,
            OwnerActionKind,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            files::FileView,
            files::UploadForm,
            files::UploadResponse,
            files::FileListResponse,
            files::DeleteFileResponse,
            shares::CreateShareRequest,
            shares::CreateShareResponse,
            shares::LinkView,
            shares::LinkListResponse,
            access::AccessFileRequest,
            access::RequestOtpRequest,
            access::RequestOtpResponse,
            access::VerifyOtpRequest,
            access::AttemptView,
            access::AttemptListResponse,
            owner::OwnerActionRequest,
            owner::OwnerActionResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Files", description = "Real/decoy file assets (owner)"),
        (name = "Shares", description = "Share link management (owner)"),
        (name = "Access", description = "Recipient access and attempt log"),
        (name = "Owner", description = "Owner actions on intrusions")
    )
)]
struct ApiDoc;
