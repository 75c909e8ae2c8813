//! HTTP surface: document routes plus webhook ingestion.
//!
//! Route ordering invariant: literal subpaths (`/filters`, `/search`,
//! `/test-upload`) are registered before the parametric `/{commit}` routes
//! so a commit id can never shadow them.

pub mod config;
pub mod core;
pub mod middleware_layer;
pub mod routes;

use crate::config::ApiConfig;
use crate::core::app_state::AppState;
use crate::middleware_layer::auth::AuthRegistry;
use anyhow::Context;
use artifact_store::{ArtifactStore, FsStore, ObjectStore, S3Store, VersionIndex};
use axum::Router;
use axum::routing::{get, post, put};
use orchestrator::worker::WorkerPool;
use orchestrator::{Orchestrator, PipelineDeps};
use routes::documents::{
    detail_route, list_route, search_route, tags_route, test_upload_route,
};
use routes::webhook::webhook_route;
use std::sync::Arc;
use tracing::info;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Literal subpaths first (ordering invariant).
        .route(
            "/projects/{id}/documents/filters",
            get(list_route::document_filters_route),
        )
        .route(
            "/projects/{id}/documents/search",
            post(search_route::search_documents_route),
        )
        .route(
            "/projects/{id}/documents/test-upload",
            post(test_upload_route::test_upload_route),
        )
        .route(
            "/projects/{id}/documents",
            get(list_route::list_documents_route),
        )
        .route(
            "/projects/{id}/documents/{commit}",
            get(detail_route::document_detail_route)
                .delete(tags_route::delete_document_route),
        )
        .route(
            "/projects/{id}/documents/{commit}/summary",
            get(detail_route::document_summary_route),
        )
        .route(
            "/projects/{id}/documents/{commit}/readme",
            get(detail_route::document_readme_route),
        )
        .route(
            "/projects/{id}/documents/{commit}/metadata",
            get(detail_route::document_metadata_route),
        )
        .route(
            "/projects/{id}/documents/{commit}/tags",
            put(tags_route::update_tags_route),
        )
        .route("/webhooks/{provider}", post(webhook_route::webhook_route))
        .with_state(state)
}

/// Wire everything from the environment and serve.
pub async fn start() -> anyhow::Result<()> {
    let config = ApiConfig::load_from_env()?;

    let index = VersionIndex::connect(&config.database_url)
        .await
        .context("opening version index")?;
    let objects: Arc<dyn ObjectStore> = match &config.s3_bucket {
        Some(bucket) => {
            Arc::new(S3Store::from_env(bucket.clone(), config.s3_endpoint.as_deref()).await)
        }
        None => Arc::new(FsStore::new(config.data_dir.clone())),
    };
    let store = ArtifactStore::new(objects, index);

    let mut deps = PipelineDeps::new(store.clone());
    deps.delivery = config.delivery_config();
    let orchestrator = Orchestrator::new(deps);
    orchestrator.start(WorkerPool::default_workers());

    let state = Arc::new(AppState {
        store,
        orchestrator,
        auth: AuthRegistry::parse(&config.auth_tokens),
        webhook_secret: config.webhook_secret.clone(),
        config: config.clone(),
    });

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .context("binding listener")?;
    info!(port = config.port, "docpulse api listening");
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
