//! Document routes: listing, filters, search, content, tags, deletion and
//! the admin test-upload path.

pub mod detail_route;
pub mod list_route;
pub mod search_route;
pub mod tags_route;
pub mod test_upload_route;

use crate::core::app_state::AppState;
use crate::core::http::response_envelope::{internal_error, not_found};
use artifact_store::ProjectRow;
use axum::response::Response;
use std::sync::Arc;

/// Member access requires the project to exist.
pub(crate) async fn require_project(
    state: &Arc<AppState>,
    project_id: &str,
) -> Result<ProjectRow, Response> {
    match state.store.index().find_project(project_id).await {
        Ok(Some(project)) => Ok(project),
        Ok(None) => Err(not_found(format!("project {project_id} not found"))),
        Err(e) => Err(internal_error(e)),
    }
}
