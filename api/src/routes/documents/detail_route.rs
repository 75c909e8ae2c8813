//! `GET /projects/{id}/documents/{commit}` and the per-artifact content
//! routes (`/summary`, `/readme`, `/metadata`).

use crate::core::app_state::AppState;
use crate::core::http::response_envelope::{ApiResponse, internal_error, not_found};
use crate::middleware_layer::auth::authenticate;
use crate::routes::documents::require_project;
use artifact_store::VersionMetadata;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

#[derive(Serialize)]
pub struct DocumentDetail {
    pub metadata: VersionMetadata,
    /// Relative paths of every stored object for the commit.
    pub files: Vec<String>,
}

#[instrument(name = "document_detail_route", skip(state, headers))]
pub async fn document_detail_route(
    State(state): State<Arc<AppState>>,
    Path((project_id, commit)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = authenticate(&state.auth, &headers) {
        return resp;
    }
    if let Err(resp) = require_project(&state, &project_id).await {
        return resp;
    }

    let metadata = match state.store.get_metadata(&project_id, &commit).await {
        Ok(Some(meta)) => meta,
        Ok(None) => return not_found(format!("no documents for commit {commit}")),
        Err(e) => return internal_error(e),
    };
    match state.store.get_content(&project_id, &commit).await {
        Ok(content) => ApiResponse::success(DocumentDetail {
            metadata,
            files: content.into_keys().collect(),
        })
        .into_response_with_status(StatusCode::OK),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Clone, Copy)]
enum ArtifactKind {
    Summary,
    Readme,
}

#[instrument(name = "document_summary_route", skip(state, headers))]
pub async fn document_summary_route(
    State(state): State<Arc<AppState>>,
    Path((project_id, commit)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    artifact_response(&state, &headers, &project_id, &commit, ArtifactKind::Summary).await
}

#[instrument(name = "document_readme_route", skip(state, headers))]
pub async fn document_readme_route(
    State(state): State<Arc<AppState>>,
    Path((project_id, commit)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    artifact_response(&state, &headers, &project_id, &commit, ArtifactKind::Readme).await
}

#[instrument(name = "document_metadata_route", skip(state, headers))]
pub async fn document_metadata_route(
    State(state): State<Arc<AppState>>,
    Path((project_id, commit)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = authenticate(&state.auth, &headers) {
        return resp;
    }
    if let Err(resp) = require_project(&state, &project_id).await {
        return resp;
    }
    match state.store.get_metadata(&project_id, &commit).await {
        Ok(Some(meta)) => {
            ApiResponse::success(meta).into_response_with_status(StatusCode::OK)
        }
        Ok(None) => not_found(format!("no documents for commit {commit}")),
        Err(e) => internal_error(e),
    }
}

async fn artifact_response(
    state: &Arc<AppState>,
    headers: &HeaderMap,
    project_id: &str,
    commit: &str,
    kind: ArtifactKind,
) -> Response {
    if let Err(resp) = authenticate(&state.auth, headers) {
        return resp;
    }
    if let Err(resp) = require_project(state, project_id).await {
        return resp;
    }
    let fetched = match kind {
        ArtifactKind::Summary => state.store.get_summary(project_id, commit).await,
        ArtifactKind::Readme => state.store.get_readme(project_id, commit).await,
    };
    match fetched {
        Ok(Some(bytes)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            bytes,
        )
            .into_response(),
        Ok(None) => not_found(format!("no documents for commit {commit}")),
        Err(e) => internal_error(e),
    }
}
