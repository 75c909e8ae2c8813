//! The artifact store facade: content-addressed objects + version index.
//!
//! Layout (external contract, bit-exact):
//!
//! ```text
//! projects/{project_id}/commits/{commit_id}/
//!     metadata.json
//!     summaries/summary.md
//!     docs/README.generated.md
//!     docs/api/api-reference.md
//!     docs/architecture/...
//!     docs/adr/...
//! ```
//!
//! Write ordering is part of the contract: objects first, `metadata.json`
//! last, index row after that, so partial uploads are invisible to `list`.
//! Deletes run the other way: objects first, index row last.

use crate::errors::{Result, StoreError};
use crate::index::{VersionIndex, VersionRow};
use crate::metadata::VersionMetadata;
use crate::object_store::ObjectStore;
use artifact_gen::{API_REFERENCE_PATH, DocumentBundle, README_PATH, SUMMARY_PATH};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const METADATA_FILE: &str = "metadata.json";

/// Caller-facing description of an upload.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub title: String,
    pub description: String,
    pub branch: Option<String>,
    pub version: Option<String>,
    pub tags: Vec<String>,
    pub commit_url: Option<String>,
    pub branch_url: Option<String>,
}

/// Search predicates; every given predicate ANDs with the text match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchFilters {
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SearchHit {
    pub commit_id: String,
    pub path: String,
    pub snippet: String,
    pub line: usize,
}

#[derive(Clone)]
pub struct ArtifactStore {
    objects: Arc<dyn ObjectStore>,
    index: VersionIndex,
}

impl ArtifactStore {
    pub fn new(objects: Arc<dyn ObjectStore>, index: VersionIndex) -> Self {
        Self { objects, index }
    }

    pub fn index(&self) -> &VersionIndex {
        &self.index
    }

    pub fn commit_prefix(project_id: &str, commit_id: &str) -> String {
        format!("projects/{project_id}/commits/{commit_id}/")
    }

    /// Upload a bundle for `(project, commit)`.
    ///
    /// Re-running for the same commit overwrites in place; `createdAt` of an
    /// existing version survives, `updatedAt` moves forward.
    #[instrument(skip(self, bundle, req), fields(project = %project_id, commit = %commit_id, files = bundle.len()))]
    pub async fn upload(
        &self,
        project_id: &str,
        commit_id: &str,
        bundle: &DocumentBundle,
        req: UploadRequest,
    ) -> Result<VersionMetadata> {
        let prefix = Self::commit_prefix(project_id, commit_id);
        let now = Utc::now();
        let existing = self.get_metadata(project_id, commit_id).await?;

        // 1. Artifact objects.
        for (path, bytes) in bundle.iter() {
            self.objects
                .put(&format!("{prefix}{path}"), Bytes::from(bytes.clone()))
                .await?;
        }

        // 2. metadata.json, written only once every object exists.
        let metadata = VersionMetadata {
            version: req.version.clone(),
            branch: req.branch.clone(),
            commit: commit_id.to_string(),
            commit_url: req.commit_url.clone(),
            branch_url: req.branch_url.clone(),
            tags: req.tags.clone(),
            created_at: existing.as_ref().map(|m| m.created_at).unwrap_or(now),
            updated_at: now,
            title: req.title.clone(),
            description: req.description.clone(),
        };
        self.objects
            .put(
                &format!("{prefix}{METADATA_FILE}"),
                Bytes::from(metadata.to_json_bytes()?),
            )
            .await?;

        // 3. Index row, last: `list` never sees a commit without metadata.
        // On conflict the original row id survives (id is not in the
        // upsert's SET list), so a fresh id here only applies to inserts.
        let row = VersionRow {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            commit_id: commit_id.to_string(),
            branch: req.branch,
            version: req.version,
            title: req.title,
            description: req.description,
            tags: serde_json::to_string(&req.tags)?,
            summary_path: bundle.get(SUMMARY_PATH).map(|_| SUMMARY_PATH.to_string()),
            readme_path: bundle.get(README_PATH).map(|_| README_PATH.to_string()),
            api_docs_path: bundle
                .get(API_REFERENCE_PATH)
                .map(|_| API_REFERENCE_PATH.to_string()),
            created_at: metadata.created_at,
            updated_at: metadata.updated_at,
        };
        self.index.upsert_version(&row).await?;

        info!("bundle uploaded");
        Ok(metadata)
    }

    /// Commit ids for a project, most recently updated first.
    pub async fn list(&self, project_id: &str) -> Result<Vec<String>> {
        Ok(self
            .index
            .list_versions(project_id)
            .await?
            .into_iter()
            .map(|r| r.commit_id)
            .collect())
    }

    /// Read `metadata.json`; `None` when the commit has no stored bundle.
    pub async fn get_metadata(
        &self,
        project_id: &str,
        commit_id: &str,
    ) -> Result<Option<VersionMetadata>> {
        let key = format!("{}{METADATA_FILE}", Self::commit_prefix(project_id, commit_id));
        match self.objects.get(&key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every object under the commit prefix, keyed by relative path.
    pub async fn get_content(
        &self,
        project_id: &str,
        commit_id: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>> {
        let prefix = Self::commit_prefix(project_id, commit_id);
        let mut out = BTreeMap::new();
        for key in self.objects.list(&prefix).await? {
            if let Some(bytes) = self.objects.get(&key).await? {
                let rel = key.trim_start_matches(&prefix).to_string();
                out.insert(rel, bytes.to_vec());
            }
        }
        Ok(out)
    }

    pub async fn get_summary(&self, project_id: &str, commit_id: &str) -> Result<Option<Vec<u8>>> {
        self.get_artifact(project_id, commit_id, SUMMARY_PATH).await
    }

    pub async fn get_readme(&self, project_id: &str, commit_id: &str) -> Result<Option<Vec<u8>>> {
        self.get_artifact(project_id, commit_id, README_PATH).await
    }

    pub async fn get_api_docs(&self, project_id: &str, commit_id: &str) -> Result<Option<Vec<u8>>> {
        self.get_artifact(project_id, commit_id, API_REFERENCE_PATH).await
    }

    async fn get_artifact(
        &self,
        project_id: &str,
        commit_id: &str,
        rel: &str,
    ) -> Result<Option<Vec<u8>>> {
        let key = format!("{}{rel}", Self::commit_prefix(project_id, commit_id));
        Ok(self.objects.get(&key).await?.map(|b| b.to_vec()))
    }

    /// Case-insensitive substring search over markdown bodies.
    #[instrument(skip(self, filters), fields(project = %project_id, query = %query))]
    pub async fn search(
        &self,
        project_id: &str,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>> {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits = Vec::new();
        for row in self.index.list_versions(project_id).await? {
            if !filters_match(&row, filters) {
                continue;
            }
            let content = self.get_content(project_id, &row.commit_id).await?;
            for (path, bytes) in content {
                if !path.ends_with(".md") {
                    continue;
                }
                let Ok(text) = std::str::from_utf8(&bytes) else {
                    warn!(%path, "non-utf8 markdown skipped");
                    continue;
                };
                for (idx, line) in text.lines().enumerate() {
                    if line.to_lowercase().contains(&needle) {
                        hits.push(SearchHit {
                            commit_id: row.commit_id.clone(),
                            path: path.clone(),
                            snippet: snippet_of(line),
                            line: idx + 1,
                        });
                    }
                }
            }
        }
        Ok(hits)
    }

    /// Rewrite tags (and optionally the version label) in `metadata.json`
    /// only; artifacts are untouched.
    pub async fn update_tags(
        &self,
        project_id: &str,
        commit_id: &str,
        tags: Vec<String>,
        version: Option<String>,
    ) -> Result<VersionMetadata> {
        let mut metadata = self
            .get_metadata(project_id, commit_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{project_id}/{commit_id}")))?;

        metadata.tags = tags.clone();
        if version.is_some() {
            metadata.version = version.clone();
        }
        metadata.updated_at = Utc::now();

        let key = format!("{}{METADATA_FILE}", Self::commit_prefix(project_id, commit_id));
        self.objects
            .put(&key, Bytes::from(metadata.to_json_bytes()?))
            .await?;

        self.index
            .update_version_tags(
                project_id,
                commit_id,
                &serde_json::to_string(&tags)?,
                version.as_deref(),
                metadata.updated_at,
            )
            .await?;

        Ok(metadata)
    }

    /// Remove the bundle: objects first, index row last, so an observer
    /// never finds an indexed commit without objects.
    #[instrument(skip(self), fields(project = %project_id, commit = %commit_id))]
    pub async fn delete(&self, project_id: &str, commit_id: &str) -> Result<()> {
        let prefix = Self::commit_prefix(project_id, commit_id);
        self.objects.delete_prefix(&prefix).await?;
        self.index.delete_version(project_id, commit_id).await?;
        info!("bundle deleted");
        Ok(())
    }

    /// Previous stored bundle along the branch, for drift analysis.
    pub async fn previous_content(
        &self,
        project_id: &str,
        branch: Option<&str>,
        exclude_commit: &str,
    ) -> Result<Option<(String, BTreeMap<String, Vec<u8>>)>> {
        let Some(prev) = self
            .index
            .latest_other_version(project_id, branch, exclude_commit)
            .await?
        else {
            return Ok(None);
        };
        let content = self.get_content(project_id, &prev.commit_id).await?;
        Ok(Some((prev.commit_id, content)))
    }
}

fn filters_match(row: &VersionRow, filters: &SearchFilters) -> bool {
    if let Some(branch) = &filters.branch {
        if row.branch.as_deref() != Some(branch.as_str()) {
            return false;
        }
    }
    if let Some(commit) = &filters.commit {
        // Short-sha prefixes are accepted.
        if !row.commit_id.starts_with(commit.as_str()) {
            return false;
        }
    }
    if let Some(tags) = &filters.tags {
        let row_tags = row.tag_list();
        if !tags.iter().all(|t| row_tags.contains(t)) {
            return false;
        }
    }
    true
}

fn snippet_of(line: &str) -> String {
    const MAX: usize = 160;
    let trimmed = line.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut end = MAX;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    }
}
