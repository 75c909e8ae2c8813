//! Working-tree acquisition for the documentation pipeline.
//!
//! - Local paths are validated in place, never fetched or mutated.
//! - Remote URLs are cloned into a scratch directory via `spawn_blocking`.
//! - Credentials go through libgit2 credential callbacks only; they are
//!   never interpolated into URLs and never appear in scratch dir names.
//! - Network failures are retried with exponential backoff.

pub mod errors;
pub mod retry;

use chrono::{DateTime, Utc};
use errors::{FetchError, Result};
use git2::build::RepoBuilder;
use git2::{Cred, CredentialType, FetchOptions, RemoteCallbacks, Repository};
use retry::RetryPolicy;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::task;
use tracing::{debug, info, instrument};

/// Where the source lives.
#[derive(Debug, Clone)]
pub enum RepoSource {
    LocalPath(PathBuf),
    RemoteUrl(String),
}

/// HTTPS credential for private upstreams.
///
/// `Debug` never shows the token.
#[derive(Clone)]
pub struct Credential {
    pub username: String,
    pub token: String,
}

impl Credential {
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            username: "oauth2".to_string(),
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("token", &"***")
            .finish()
    }
}

/// A fetch order: source plus optional credential, branch and revision.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub source: RepoSource,
    pub credential: Option<Credential>,
    pub branch: Option<String>,
    pub revision: Option<String>,
}

impl FetchRequest {
    pub fn new(source: RepoSource) -> Self {
        Self {
            source,
            credential: None,
            branch: None,
            revision: None,
        }
    }
}

/// Identity of the revision a fetch resolved to.
#[derive(Debug, Clone)]
pub struct ResolvedCommit {
    pub sha: String,
    pub short_sha: String,
    pub branch: String,
    pub author: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ResolvedCommit {
    /// Commit context for the impact report.
    pub fn to_context(&self, repository: &str) -> impact_report::CommitContext {
        impact_report::CommitContext {
            repository: repository.to_string(),
            branch: self.branch.clone(),
            commit_sha: self.sha.clone(),
            author: self.author.clone(),
            commit_message: self.message.clone(),
            commit_timestamp: self.timestamp,
        }
    }
}

/// A checked-out working tree plus its resolved commit.
///
/// Remote clones own their scratch directory; dropping the value removes it.
#[derive(Debug)]
pub struct FetchedSource {
    path: PathBuf,
    commit: ResolvedCommit,
    _scratch: Option<TempDir>,
}

impl FetchedSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn commit(&self) -> &ResolvedCommit {
        &self.commit
    }
}

/// Acquire a working tree for the request, retrying transient failures.
#[instrument(skip(req), fields(branch = req.branch.as_deref().unwrap_or("main")))]
pub async fn fetch(req: FetchRequest) -> Result<FetchedSource> {
    retry::retry_with_backoff(RetryPolicy::default(), FetchError::is_retryable, || {
        let req = req.clone();
        async move { task::spawn_blocking(move || fetch_blocking(&req)).await? }
    })
    .await
}

fn fetch_blocking(req: &FetchRequest) -> Result<FetchedSource> {
    match &req.source {
        RepoSource::LocalPath(path) => {
            let repo = Repository::open(path)
                .map_err(|_| FetchError::MissingRepo(path.display().to_string()))?;
            let commit = resolve_commit(&repo, req.branch.as_deref(), req.revision.as_deref())?;
            info!(sha = %commit.short_sha, "resolved local working tree");
            Ok(FetchedSource {
                path: path.clone(),
                commit,
                _scratch: None,
            })
        }
        RepoSource::RemoteUrl(url) => {
            // The scratch dir name carries no credential material.
            let scratch = tempfile::Builder::new()
                .prefix("docpulse-src-")
                .tempdir()?;
            let repo = clone_into(url, scratch.path(), req)?;
            let commit = resolve_commit(&repo, req.branch.as_deref(), req.revision.as_deref())?;

            // Detach onto the requested revision so the tree matches it.
            if req.revision.is_some() {
                let oid = git2::Oid::from_str(&commit.sha)?;
                let obj = repo.find_object(oid, None)?;
                repo.checkout_tree(&obj, Some(git2::build::CheckoutBuilder::new().force()))?;
                repo.set_head_detached(oid)?;
            }

            let path = scratch.path().to_path_buf();
            info!(sha = %commit.short_sha, "clone complete");
            Ok(FetchedSource {
                path,
                commit,
                _scratch: Some(scratch),
            })
        }
    }
}

fn clone_into(url: &str, target: &Path, req: &FetchRequest) -> Result<Repository> {
    let mut fetch_opts = FetchOptions::new();
    fetch_opts.remote_callbacks(remote_callbacks(req.credential.clone()));

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch_opts);
    if let Some(branch) = &req.branch {
        builder.branch(branch);
    }

    debug!(path = %target.display(), "begin clone");
    Ok(builder.clone(url, target)?)
}

/// Credential chain: injected token, then ssh-agent, then libgit2 defaults.
///
/// Shared with the delivery agent, which pushes with the same discipline.
pub fn remote_callbacks(credential: Option<Credential>) -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, username_from_url, allowed| {
        if let Some(c) = &credential {
            if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
                return Cred::userpass_plaintext(&c.username, &c.token);
            }
        }
        if allowed.contains(CredentialType::SSH_KEY) {
            if let Ok(cred) = Cred::ssh_key_from_agent(username_from_url.unwrap_or("git")) {
                return Ok(cred);
            }
        }
        if allowed.contains(CredentialType::DEFAULT) {
            if let Ok(cred) = Cred::default() {
                return Ok(cred);
            }
        }
        if allowed.contains(CredentialType::USERNAME) {
            return Cred::username(username_from_url.unwrap_or("git"));
        }
        Err(git2::Error::from_str("no usable credentials"))
    });
    callbacks
}

fn resolve_commit(
    repo: &Repository,
    branch: Option<&str>,
    revision: Option<&str>,
) -> Result<ResolvedCommit> {
    let (commit, branch_name) = match revision {
        Some(rev) => {
            let commit = repo
                .revparse_single(rev)
                .and_then(|o| o.peel_to_commit())
                .map_err(|_| FetchError::RevisionNotFound(rev.to_string()))?;
            (commit, branch.unwrap_or("main").to_string())
        }
        None => {
            let name = branch.unwrap_or("main");
            match branch_tip(repo, name) {
                Some(commit) => (commit, name.to_string()),
                // No explicit branch requested: fall back to wherever HEAD is.
                None if branch.is_none() => {
                    let head = repo.head()?;
                    let short = head.shorthand().unwrap_or("HEAD").to_string();
                    (head.peel_to_commit()?, short)
                }
                None => return Err(FetchError::RevisionNotFound(name.to_string())),
            }
        }
    };

    let author = commit.author();
    Ok(ResolvedCommit {
        sha: commit.id().to_string(),
        short_sha: commit.id().to_string()[..7].to_string(),
        branch: branch_name,
        author: author.name().unwrap_or("unknown").to_string(),
        message: commit.message().unwrap_or_default().trim_end().to_string(),
        timestamp: DateTime::from_timestamp(commit.time().seconds(), 0).unwrap_or_default(),
    })
}

fn branch_tip<'r>(repo: &'r Repository, name: &str) -> Option<git2::Commit<'r>> {
    if let Ok(branch) = repo.find_branch(name, git2::BranchType::Local) {
        return branch.get().peel_to_commit().ok();
    }
    repo.find_reference(&format!("refs/remotes/origin/{name}"))
        .ok()
        .and_then(|r| r.peel_to_commit().ok())
}
