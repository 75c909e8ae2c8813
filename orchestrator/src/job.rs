//! Pipeline job identity and trigger payloads.

use source_fetcher::{Credential, RepoSource};

/// Coalescing key: at most one in-flight job per `(project_id, commit_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub project_id: String,
    pub commit_id: String,
}

impl JobKey {
    pub fn new(project_id: impl Into<String>, commit_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            commit_id: commit_id.into(),
        }
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.project_id, self.commit_id)
    }
}

/// What a trigger (webhook or direct call) carries into the pipeline.
#[derive(Debug, Clone)]
pub struct TriggerPayload {
    pub source: RepoSource,
    pub branch: Option<String>,
    pub credential: Option<Credential>,
    /// Display name used in artifacts; falls back to the project id.
    pub repository_name: Option<String>,
    pub commit_url: Option<String>,
    pub branch_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineJob {
    pub key: JobKey,
    pub payload: TriggerPayload,
}
