//! Shared state for handlers.

use crate::config::ApiConfig;
use crate::middleware_layer::auth::AuthRegistry;
use artifact_store::ArtifactStore;
use orchestrator::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    /// Versioned artifact store (objects + index).
    pub store: ArtifactStore,
    /// Pipeline trigger entry point.
    pub orchestrator: Orchestrator,
    /// Bearer token → principal table.
    pub auth: AuthRegistry,
    /// Shared secret for webhook HMAC validation.
    pub webhook_secret: String,
    pub config: ApiConfig,
}
