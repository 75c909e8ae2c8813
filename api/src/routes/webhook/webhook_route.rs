//! `POST /webhooks/{provider}`: public, HMAC-validated trigger ingestion.
//!
//! The signature is an HMAC-SHA256 of the raw request body with the shared
//! secret, carried as `X-Hub-Signature-256: sha256=<hex>`. A mismatch is a
//! 401; the body is never parsed before the signature checks out.

use crate::core::app_state::AppState;
use crate::core::http::response_envelope::{ApiResponse, bad_request, internal_error, not_found};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use hmac::{Hmac, Mac};
use orchestrator::job::{JobKey, PipelineJob, TriggerPayload};
use orchestrator::queue::EnqueueResult;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use source_fetcher::{Credential, RepoSource};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Provider push payload, github-style subset. Other providers are mapped
/// to the same shape by their webhook configuration.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    /// `refs/heads/<branch>` for branch pushes.
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
    /// Target commit sha.
    pub after: String,
    pub repository: WebhookRepository,
}

#[derive(Debug, Deserialize)]
pub struct WebhookRepository {
    pub clone_url: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Serialize)]
pub struct WebhookAccepted {
    pub project_id: String,
    pub commit: String,
    /// `queued` for a new slot, `coalesced` when a pending slot absorbed it.
    pub status: &'static str,
}

#[instrument(name = "webhook_route", skip(state, headers, body), fields(provider = %provider))]
pub async fn webhook_route(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(id) = headers.get("X-Request-Id").and_then(|h| h.to_str().ok()) {
        debug!(%id, "request id attached");
    }

    // --- Signature check before any parsing -----------------------------
    if let Err(resp) = verify_signature(&state.webhook_secret, &headers, &body) {
        return resp;
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => return bad_request(format!("invalid webhook payload: {e}")),
    };

    let commit = payload.after.trim().to_string();
    if commit.is_empty() || commit.chars().all(|c| c == '0') {
        return bad_request("payload carries no target commit");
    }

    // --- Resolve the project by upstream URL -----------------------------
    let project = match state
        .store
        .index()
        .find_project_by_url(&payload.repository.clone_url)
        .await
    {
        Ok(Some(project)) => project,
        Ok(None) => {
            warn!(url = %redact::sanitize(&payload.repository.clone_url), "no project for upstream");
            return not_found("no project registered for this repository");
        }
        Err(e) => return internal_error(e),
    };

    let credential = match state.store.index().get_settings(&project.id).await {
        Ok(Some(settings)) => settings.upstream_credential.map(Credential::token),
        _ => None,
    };

    let branch = payload
        .git_ref
        .as_deref()
        .and_then(|r| r.strip_prefix("refs/heads/"))
        .map(str::to_string);

    let job = PipelineJob {
        key: JobKey::new(project.id.clone(), commit.clone()),
        payload: TriggerPayload {
            source: RepoSource::RemoteUrl(payload.repository.clone_url.clone()),
            branch,
            credential,
            repository_name: Some(project.name.clone()),
            commit_url: payload
                .repository
                .html_url
                .as_ref()
                .map(|base| format!("{base}/commit/{commit}")),
            branch_url: payload.repository.html_url.clone(),
        },
    };

    let status = match state.orchestrator.enqueue(job) {
        EnqueueResult::Queued => "queued",
        EnqueueResult::Coalesced => "coalesced",
    };
    info!(project = %project.id, %commit, status, "webhook accepted");

    ApiResponse::success(WebhookAccepted {
        project_id: project.id,
        commit,
        status,
    })
    .into_response_with_status(StatusCode::ACCEPTED)
}

/// Constant-time HMAC verification of the raw body.
pub fn verify_signature(
    secret: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), Response> {
    let unauthorized = || {
        ApiResponse::<()>::error(
            "UNAUTHORIZED",
            "Webhook signature missing or invalid.",
            Vec::new(),
        )
        .into_response_with_status(StatusCode::UNAUTHORIZED)
    };

    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("sha256="))
        .ok_or_else(unauthorized)?;
    let provided = hex::decode(provided).map_err(|_| unauthorized())?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| unauthorized())?;
    mac.update(body);
    mac.verify_slice(&provided).map_err(|_| unauthorized())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_headers(secret: &str, body: &[u8]) -> HeaderMap {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let sig = hex::encode(mac.finalize().into_bytes());
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, format!("sha256={sig}").parse().unwrap());
        headers
    }

    #[test]
    fn valid_signature_passes() {
        let body = br#"{"after":"abc"}"#;
        let headers = signed_headers("s3cret", body);
        assert!(verify_signature("s3cret", &headers, body).is_ok());
    }

    #[test]
    fn wrong_secret_fails() {
        let body = br#"{"after":"abc"}"#;
        let headers = signed_headers("other", body);
        assert!(verify_signature("s3cret", &headers, body).is_err());
    }

    #[test]
    fn tampered_body_fails() {
        let body = br#"{"after":"abc"}"#;
        let headers = signed_headers("s3cret", body);
        assert!(verify_signature("s3cret", &headers, br#"{"after":"zzz"}"#).is_err());
    }

    #[test]
    fn missing_header_fails() {
        let headers = HeaderMap::new();
        assert!(verify_signature("s3cret", &headers, b"{}").is_err());
    }
}
