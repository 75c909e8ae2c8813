//! Change detection between a revision and its first parent.
//!
//! Produces an ordered, language-tagged change list with noise filtered out.
//! The initial commit (no parent) enumerates every tracked file as ADDED.

pub mod errors;
pub mod filter;

use errors::{DetectError, Result};
use filter::ScanConfig;
use git2::{Commit, Delta, DiffOptions, Repository, TreeWalkMode, TreeWalkResult};
use impact_report::{ChangeKind, Language};
use std::path::Path;
use tracing::{debug, info, instrument};

/// One detected file change, with both revisions' text when readable.
#[derive(Debug, Clone)]
pub struct DetectedChange {
    pub path: String,
    pub kind: ChangeKind,
    pub language: Language,
    pub is_binary: bool,
    /// False when the content failed UTF-8 decoding; parsers must skip it.
    pub safe_to_read: bool,
    /// Content at the parent revision (None for ADDED or unreadable files).
    pub old_text: Option<String>,
    /// Content at the target revision (None for DELETED or unreadable files).
    pub new_text: Option<String>,
}

/// Diff `sha` against its first parent in the repository at `repo_path`.
///
/// Output is stable: path-sorted, filtered through the configured ignore
/// globs, binary-flagged by a UTF-8 probe.
#[instrument(skip(cfg), fields(repo = %repo_path.display(), rev = %sha))]
pub fn detect_changes(
    repo_path: &Path,
    sha: &str,
    cfg: &ScanConfig,
) -> Result<Vec<DetectedChange>> {
    let repo = Repository::open(repo_path).map_err(|e| match e.code() {
        git2::ErrorCode::NotFound => DetectError::MissingRepo(repo_path.display().to_string()),
        _ => DetectError::Git(e),
    })?;

    let object = repo
        .revparse_single(sha)
        .map_err(|_| DetectError::RevisionNotFound(sha.to_string()))?;
    let commit = object
        .peel_to_commit()
        .map_err(|_| DetectError::RevisionNotFound(sha.to_string()))?;

    let mut changes = if commit.parent_count() == 0 {
        initial_commit_changes(&repo, &commit, cfg)?
    } else {
        diff_against_parent(&repo, &commit, cfg)?
    };

    changes.sort_by(|a, b| a.path.cmp(&b.path));
    info!(total = changes.len(), "change detection complete");
    Ok(changes)
}

fn initial_commit_changes(
    repo: &Repository,
    commit: &Commit<'_>,
    cfg: &ScanConfig,
) -> Result<Vec<DetectedChange>> {
    let tree = commit.tree()?;
    let mut out = Vec::new();

    tree.walk(TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() != Some(git2::ObjectType::Blob) {
            return TreeWalkResult::Ok;
        }
        let name = entry.name().unwrap_or_default();
        let path = format!("{root}{name}");
        if cfg.is_ignored(&path) {
            debug!(%path, "ignored by glob");
            return TreeWalkResult::Ok;
        }
        if let Ok(blob) = repo.find_blob(entry.id()) {
            out.push(change_from_blob(&path, ChangeKind::Added, None, blob.content()));
        }
        TreeWalkResult::Ok
    })?;

    Ok(out)
}

fn diff_against_parent(
    repo: &Repository,
    commit: &Commit<'_>,
    cfg: &ScanConfig,
) -> Result<Vec<DetectedChange>> {
    let parent = commit.parent(0)?;
    let old_tree = parent.tree()?;
    let new_tree = commit.tree()?;

    let mut opts = DiffOptions::new();
    opts.include_typechange(false);
    let diff = repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut opts))?;

    let mut out = Vec::new();
    for delta in diff.deltas() {
        let kind = match delta.status() {
            Delta::Added => ChangeKind::Added,
            Delta::Deleted => ChangeKind::Deleted,
            Delta::Modified | Delta::Renamed | Delta::Copied | Delta::Typechange => {
                ChangeKind::Modified
            }
            _ => continue,
        };

        let path = delta
            .new_file()
            .path()
            .or_else(|| delta.old_file().path())
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        if path.is_empty() || cfg.is_ignored(&path) {
            debug!(%path, "ignored by glob");
            continue;
        }

        let old_bytes = (kind != ChangeKind::Added)
            .then(|| repo.find_blob(delta.old_file().id()).ok())
            .flatten()
            .map(|b| b.content().to_vec());
        let new_bytes = (kind != ChangeKind::Deleted)
            .then(|| repo.find_blob(delta.new_file().id()).ok())
            .flatten()
            .map(|b| b.content().to_vec());

        out.push(change_from_bytes(
            &path,
            kind,
            old_bytes.as_deref(),
            new_bytes.as_deref(),
        ));
    }

    Ok(out)
}

fn change_from_blob(
    path: &str,
    kind: ChangeKind,
    old: Option<&[u8]>,
    new: &[u8],
) -> DetectedChange {
    change_from_bytes(path, kind, old, Some(new))
}

fn change_from_bytes(
    path: &str,
    kind: ChangeKind,
    old: Option<&[u8]>,
    new: Option<&[u8]>,
) -> DetectedChange {
    let old_text = old.map(|b| std::str::from_utf8(b).map(str::to_owned));
    let new_text = new.map(|b| std::str::from_utf8(b).map(str::to_owned));

    // A decode failure on either side marks the file binary and unreadable.
    let is_binary = matches!(&old_text, Some(Err(_))) || matches!(&new_text, Some(Err(_)));

    DetectedChange {
        path: path.to_string(),
        kind,
        language: if is_binary {
            Language::Other
        } else {
            Language::from_path(path)
        },
        is_binary,
        safe_to_read: !is_binary,
        old_text: old_text.and_then(|r| r.ok()),
        new_text: new_text.and_then(|r| r.ok()),
    }
}
