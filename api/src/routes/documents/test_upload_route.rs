//! `POST /projects/{id}/documents/test-upload`: owner/admin path that
//! stores a caller-provided bundle without running the pipeline.

use crate::core::app_state::AppState;
use crate::core::http::response_envelope::{ApiResponse, bad_request, internal_error};
use crate::middleware_layer::auth::{Capability, authenticate, authorize};
use crate::routes::documents::require_project;
use artifact_gen::{DocumentBundle, SUMMARY_PATH};
use artifact_store::UploadRequest;
use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestUploadRequest {
    pub commit_hash: String,
    pub title: String,
    /// Becomes `summaries/summary.md`.
    pub summary: String,
    /// Extra documents, keyed by path relative to `docs/`.
    #[serde(default)]
    pub docs: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub version: Option<String>,
}

#[instrument(name = "test_upload_route", skip(state, headers, body))]
pub async fn test_upload_route(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<TestUploadRequest>,
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

    let commit = body.commit_hash.trim().to_string();
    if commit.len() < 7 || commit.len() > 40 || !commit.chars().all(|c| c.is_ascii_hexdigit()) {
        return bad_request("commitHash must be 7-40 hex characters");
    }

    let mut bundle = DocumentBundle::default();
    bundle.insert(SUMMARY_PATH, body.summary.into_bytes());
    if let Some(docs) = body.docs {
        for (path, content) in docs {
            if path.contains("..") || path.starts_with('/') {
                return bad_request(format!("invalid docs path {path}"));
            }
            bundle.insert(format!("docs/{path}"), content.into_bytes());
        }
    }

    let upload = UploadRequest {
        title: body.title,
        description: body.description.unwrap_or_default(),
        branch: body.branch,
        version: body.version,
        tags: body.tags.unwrap_or_default(),
        commit_url: None,
        branch_url: None,
    };
    match state.store.upload(&project_id, &commit, &bundle, upload).await {
        Ok(metadata) => {
            ApiResponse::success(metadata).into_response_with_status(StatusCode::CREATED)
        }
        Err(e) => internal_error(e),
    }
}
