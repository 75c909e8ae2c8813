//! Branch, commit and push mechanics on the delivery working copy.
//!
//! Pushes are plain fast-forward pushes with upstream tracking; a rejected
//! push is reported as a rejection, never retried with force.

use crate::errors::{DeliveryError, Result};
use git2::build::CheckoutBuilder;
use git2::{BranchType, PushOptions, Repository, Signature};
use source_fetcher::Credential;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Committer identity for generated docs commits.
const BOT_NAME: &str = "docpulse-bot";
const BOT_EMAIL: &str = "docs-bot@docpulse.dev";

/// Outcome of a push attempt.
#[derive(Debug, Clone)]
pub enum PushStatus {
    Pushed,
    /// The remote refused the ref update (non-fast-forward, protected ref).
    Rejected(String),
}

/// Check out `branch` (creating it off HEAD when missing), write the bundle
/// files under `docs_root` and commit them.
pub fn commit_bundle(
    worktree: &Path,
    branch: &str,
    docs_root: &str,
    files: &[(String, Vec<u8>)],
    message: &str,
) -> Result<()> {
    let repo = Repository::open(worktree)?;
    let head_commit = repo.head()?.peel_to_commit()?;

    if repo.find_branch(branch, BranchType::Local).is_err() {
        repo.branch(branch, &head_commit, false)?;
    }
    repo.set_head(&format!("refs/heads/{branch}"))?;
    repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
    debug!(%branch, "docs branch checked out");

    let root = if docs_root.is_empty() {
        worktree.to_path_buf()
    } else {
        worktree.join(docs_root)
    };
    for (rel, bytes) in files {
        let target = root.join(rel);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, bytes)?;
    }

    let mut index = repo.index()?;
    index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree = repo.find_tree(index.write_tree()?)?;

    let sig = Signature::now(BOT_NAME, BOT_EMAIL)?;
    let parent = repo.head()?.peel_to_commit()?;
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])?;
    info!(%branch, files = files.len(), "bundle committed");
    Ok(())
}

/// Push `branch` to origin with upstream tracking. Never force-pushes.
pub fn push_branch(
    worktree: &Path,
    branch: &str,
    credential: Option<Credential>,
) -> Result<PushStatus> {
    let repo = Repository::open(worktree)?;
    let mut remote = repo.find_remote("origin")?;

    let rejection: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let rejection_sink = rejection.clone();

    let mut callbacks = source_fetcher::remote_callbacks(credential);
    callbacks.push_update_reference(move |refname, status| {
        if let Some(msg) = status {
            if let Ok(mut slot) = rejection_sink.lock() {
                *slot = Some(format!("{refname}: {msg}"));
            }
        }
        Ok(())
    });

    let mut opts = PushOptions::new();
    opts.remote_callbacks(callbacks);

    // No leading '+': this is a plain (non-force) refspec.
    let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
    if let Err(e) = remote.push(&[refspec.as_str()], Some(&mut opts)) {
        let message = redact::sanitize(e.message());
        if matches!(e.class(), git2::ErrorClass::Net | git2::ErrorClass::Http) {
            return Err(DeliveryError::Git(message));
        }
        warn!(%branch, %message, "push rejected by remote");
        return Ok(PushStatus::Rejected(message));
    }

    if let Some(msg) = rejection.lock().ok().and_then(|m| m.clone()) {
        warn!(%branch, %msg, "push update rejected");
        return Ok(PushStatus::Rejected(redact::sanitize(&msg)));
    }

    // Record upstream tracking when the remote-tracking ref is available;
    // a miss here is not worth failing the delivery.
    if let Ok(mut local) = repo.find_branch(branch, BranchType::Local) {
        if local.set_upstream(Some(&format!("origin/{branch}"))).is_err() {
            debug!(%branch, "upstream tracking not recorded");
        }
    }

    info!(%branch, "branch pushed");
    Ok(PushStatus::Pushed)
}
