//! `GET /projects/{id}/documents` and `GET /projects/{id}/documents/filters`.

use crate::core::app_state::AppState;
use crate::core::http::response_envelope::{ApiResponse, internal_error};
use crate::middleware_layer::auth::authenticate;
use crate::routes::documents::require_project;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentListItem {
    pub commit: String,
    pub title: String,
    pub branch: Option<String>,
    pub version: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[instrument(name = "list_documents_route", skip(state, headers))]
pub async fn list_documents_route(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = authenticate(&state.auth, &headers) {
        return resp;
    }
    if let Err(resp) = require_project(&state, &project_id).await {
        return resp;
    }

    match state.store.index().list_versions(&project_id).await {
        Ok(rows) => {
            let items: Vec<DocumentListItem> = rows
                .into_iter()
                .map(|row| DocumentListItem {
                    commit: row.commit_id.clone(),
                    title: row.title.clone(),
                    branch: row.branch.clone(),
                    version: row.version.clone(),
                    tags: row.tag_list(),
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                })
                .collect();
            ApiResponse::success(items).into_response_with_status(StatusCode::OK)
        }
        Err(e) => internal_error(e),
    }
}

#[derive(Serialize)]
pub struct FiltersResponse {
    pub commits: Vec<String>,
    pub branches: Vec<String>,
    pub tags: Vec<String>,
}

#[instrument(name = "document_filters_route", skip(state, headers))]
pub async fn document_filters_route(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = authenticate(&state.auth, &headers) {
        return resp;
    }
    if let Err(resp) = require_project(&state, &project_id).await {
        return resp;
    }

    match state.store.index().list_versions(&project_id).await {
        Ok(rows) => {
            let mut commits = Vec::new();
            let mut branches = Vec::new();
            let mut tags = Vec::new();
            for row in &rows {
                push_unique(&mut commits, row.commit_id.clone());
                if let Some(branch) = &row.branch {
                    push_unique(&mut branches, branch.clone());
                }
                for tag in row.tag_list() {
                    push_unique(&mut tags, tag);
                }
            }
            ApiResponse::success(FiltersResponse {
                commits,
                branches,
                tags,
            })
            .into_response_with_status(StatusCode::OK)
        }
        Err(e) => internal_error(e),
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}
