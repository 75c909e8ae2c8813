//! Delivery: commit the generated bundle to an `auto/docs/<short_sha>`
//! branch in the upstream repository and open (or update) the pull request
//! carrying the summary.
//!
//! Push and PR calls are retried with exponential backoff (2s–10s, five
//! attempts). A rejected push degrades the outcome but the run continues:
//! the PR body is still refreshed.

pub mod errors;
pub mod provider;
pub mod worktree;

use artifact_gen::DocumentBundle;
use errors::{DeliveryError, Result};
use impact_report::ImpactReport;
use provider::{ProviderClient, ProviderConfig, PullRequestRef};
use source_fetcher::retry::{RetryPolicy, retry_with_backoff};
use source_fetcher::{Credential, FetchRequest, RepoSource};
use tokio::task;
use tracing::{info, instrument, warn};

/// Delivery target description.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub provider: ProviderConfig,
    /// `owner/repo` for GitHub, full project path for GitLab.
    pub repo_slug: String,
    /// Clone URL of the upstream repository.
    pub upstream_url: String,
    /// Base branch the docs PR targets.
    pub target_branch: String,
    /// Directory inside the worktree that receives the bundle ("" = root).
    pub docs_root: String,
    pub credential: Option<Credential>,
}

/// What delivery achieved.
#[derive(Debug, Clone, Default)]
pub struct DeliveryOutcome {
    pub pushed: bool,
    pub pull_request: Option<PullRequestRef>,
    pub warnings: Vec<String>,
}

impl DeliveryOutcome {
    /// True when delivery finished but with a degraded result.
    pub fn degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

pub fn branch_name(short_sha: &str) -> String {
    format!("auto/docs/{short_sha}")
}

pub fn commit_message(short_sha: &str) -> String {
    format!("docs: update for {short_sha}")
}

/// PR title carries the rolled-up severity so reviewers can triage from the
/// list view (e.g. "docs: update for abc1234 (MAJOR)").
pub fn pr_title(impact: &ImpactReport) -> String {
    format!(
        "docs: update for {} ({})",
        impact.context.short_sha(),
        impact.analysis_summary.highest_severity
    )
}

/// Run the full delivery for one commit's bundle.
#[instrument(skip_all, fields(repo = %cfg.repo_slug, commit = %impact.context.short_sha()))]
pub async fn deliver(
    cfg: &DeliveryConfig,
    impact: &ImpactReport,
    bundle: &DocumentBundle,
) -> Result<DeliveryOutcome> {
    let short_sha = impact.context.short_sha().to_string();
    let branch = branch_name(&short_sha);
    let mut outcome = DeliveryOutcome::default();

    // 1. Working copy of the upstream, same credential discipline as the
    //    fetcher (its own retry loop covers clone transients).
    let mut req = FetchRequest::new(RepoSource::RemoteUrl(cfg.upstream_url.clone()));
    req.credential = cfg.credential.clone();
    req.branch = Some(cfg.target_branch.clone());
    let worktree = source_fetcher::fetch(req).await?;

    // 2. Branch + commit once.
    let files: Vec<(String, Vec<u8>)> = bundle
        .iter()
        .map(|(path, bytes)| (path.clone(), bytes.clone()))
        .collect();
    {
        let path = worktree.path().to_path_buf();
        let branch = branch.clone();
        let docs_root = cfg.docs_root.clone();
        let message = commit_message(&short_sha);
        task::spawn_blocking(move || {
            worktree::commit_bundle(&path, &branch, &docs_root, &files, &message)
        })
        .await??;
    }

    // 3. Push, retried on transient failures; rejection is a warning.
    let push_status = retry_with_backoff(
        RetryPolicy::default(),
        DeliveryError::is_retryable,
        || {
            let path = worktree.path().to_path_buf();
            let branch = branch.clone();
            let credential = cfg.credential.clone();
            async move {
                task::spawn_blocking(move || worktree::push_branch(&path, &branch, credential))
                    .await?
            }
        },
    )
    .await?;

    match push_status {
        worktree::PushStatus::Pushed => outcome.pushed = true,
        worktree::PushStatus::Rejected(msg) => {
            warn!(%msg, "push rejected, continuing with degraded delivery");
            outcome.warnings.push(format!("push rejected: {msg}"));
        }
    }

    // 4. PR open-or-update, retried. The body is summary.md verbatim; the
    //    summary is never duplicated as a comment.
    let body = bundle
        .summary()
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_else(|| "Generated documentation update.".to_string());
    let title = pr_title(impact);
    let client = ProviderClient::from_config(cfg.provider.clone())?;

    let pr = retry_with_backoff(
        RetryPolicy::default(),
        DeliveryError::is_retryable,
        || {
            let client = client.clone();
            let slug = cfg.repo_slug.clone();
            let branch = branch.clone();
            let base = cfg.target_branch.clone();
            let title = title.clone();
            let body = body.clone();
            async move {
                client
                    .ensure_pull_request(&slug, &branch, &base, &title, &body)
                    .await
            }
        },
    )
    .await?;

    info!(pr = %pr.url, created = pr.created, "delivery complete");
    outcome.pull_request = Some(pr);
    Ok(outcome)
}
