//! `PUT /projects/{id}/documents/{commit}/tags` and
//! `DELETE /projects/{id}/documents/{commit}`, owner/admin only.

use crate::core::app_state::AppState;
use crate::core::http::response_envelope::{ApiResponse, internal_error, not_found};
use crate::middleware_layer::auth::{Capability, authenticate, authorize};
use crate::routes::documents::require_project;
use artifact_store::StoreError;
use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct UpdateTagsRequest {
    pub tags: Vec<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[instrument(name = "update_tags_route", skip(state, headers, body))]
pub async fn update_tags_route(
    State(state): State<Arc<AppState>>,
    Path((project_id, commit)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<UpdateTagsRequest>,
) -> Response {
    let principal = match authenticate(&state.auth, &headers) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    if let Err(resp) = authorize(&principal, Capability::WriteDocs) {
        return resp;
    }
    if let Err(resp) = require_project(&state, &project_id).await {
        return resp;
    }

    match state
        .store
        .update_tags(&project_id, &commit, body.tags, body.version)
        .await
    {
        Ok(metadata) => {
            ApiResponse::success(metadata).into_response_with_status(StatusCode::OK)
        }
        Err(StoreError::NotFound(what)) => not_found(what),
        Err(e) => internal_error(e),
    }
}

#[instrument(name = "delete_document_route", skip(state, headers))]
pub async fn delete_document_route(
    State(state): State<Arc<AppState>>,
    Path((project_id, commit)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let principal = match authenticate(&state.auth, &headers) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    if let Err(resp) = authorize(&principal, Capability::WriteDocs) {
        return resp;
    }
    if let Err(resp) = require_project(&state, &project_id).await {
        return resp;
    }

    match state.store.get_metadata(&project_id, &commit).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found(format!("no documents for commit {commit}")),
        Err(e) => return internal_error(e),
    }

    match state.store.delete(&project_id, &commit).await {
        Ok(()) => ApiResponse::success(serde_json::json!({ "deleted": commit }))
            .into_response_with_status(StatusCode::OK),
        Err(e) => internal_error(e),
    }
}
