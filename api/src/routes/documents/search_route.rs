//! `POST /projects/{id}/documents/search`.

use crate::core::app_state::AppState;
use crate::core::http::response_envelope::{ApiResponse, bad_request, internal_error};
use crate::middleware_layer::auth::authenticate;
use crate::routes::documents::require_project;
use artifact_store::{SearchFilters, SearchHit};
use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub commit: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[instrument(name = "search_documents_route", skip(state, headers, body))]
pub async fn search_documents_route(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SearchRequest>,
) -> Response {
    if let Err(resp) = authenticate(&state.auth, &headers) {
        return resp;
    }
    if let Err(resp) = require_project(&state, &project_id).await {
        return resp;
    }

    if body.query.trim().is_empty() {
        return bad_request("query must not be empty");
    }

    let filters = SearchFilters {
        branch: body.branch,
        commit: body.commit,
        tags: body.tags,
    };
    match state.store.search(&project_id, &body.query, &filters).await {
        Ok(hits) => ApiResponse::<Vec<SearchHit>>::success(hits)
            .into_response_with_status(StatusCode::OK),
        Err(e) => internal_error(e),
    }
}
