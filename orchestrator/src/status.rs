//! Run status registry: stage progression plus terminal outcomes.

use crate::job::JobKey;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Sequential stage machine for a single run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Queued,
    Fetching,
    Detecting,
    Parsing,
    Scoring,
    Generating,
    Drifting,
    Storing,
    Delivering,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Queued => "queued",
            Stage::Fetching => "fetching",
            Stage::Detecting => "detecting",
            Stage::Parsing => "parsing",
            Stage::Scoring => "scoring",
            Stage::Generating => "generating",
            Stage::Drifting => "drifting",
            Stage::Storing => "storing",
            Stage::Delivering => "delivering",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Terminal result of a run. `Failed` is terminal for the run but does not
/// poison the key: the next trigger starts fresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RunOutcome {
    Succeeded,
    SucceededWithWarnings { warnings: Vec<String> },
    Failed { stage: String, reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub run_id: Uuid,
    pub project_id: String,
    pub commit_id: String,
    pub stage: Stage,
    pub outcome: Option<RunOutcome>,
    pub updated_at: DateTime<Utc>,
}

/// Shared registry of run statuses, queryable by run id or key.
#[derive(Debug, Clone, Default)]
pub struct StatusRegistry {
    inner: Arc<Mutex<HashMap<Uuid, RunStatus>>>,
}

impl StatusRegistry {
    pub fn begin(&self, key: &JobKey) -> Uuid {
        let run_id = Uuid::new_v4();
        let status = RunStatus {
            run_id,
            project_id: key.project_id.clone(),
            commit_id: key.commit_id.clone(),
            stage: Stage::Queued,
            outcome: None,
            updated_at: Utc::now(),
        };
        if let Ok(mut map) = self.inner.lock() {
            map.insert(run_id, status);
        }
        run_id
    }

    pub fn set_stage(&self, run_id: Uuid, stage: Stage) {
        if let Ok(mut map) = self.inner.lock() {
            if let Some(status) = map.get_mut(&run_id) {
                status.stage = stage;
                status.updated_at = Utc::now();
            }
        }
    }

    pub fn finish(&self, run_id: Uuid, outcome: RunOutcome) {
        if let Ok(mut map) = self.inner.lock() {
            if let Some(status) = map.get_mut(&run_id) {
                if !matches!(outcome, RunOutcome::Failed { .. }) {
                    status.stage = Stage::Done;
                }
                status.outcome = Some(outcome);
                status.updated_at = Utc::now();
            }
        }
    }

    pub fn get(&self, run_id: Uuid) -> Option<RunStatus> {
        self.inner.lock().ok()?.get(&run_id).cloned()
    }

    /// Most recently updated status for a `(project, commit)` key.
    pub fn latest_for(&self, key: &JobKey) -> Option<RunStatus> {
        let map = self.inner.lock().ok()?;
        map.values()
            .filter(|s| s.project_id == key.project_id && s.commit_id == key.commit_id)
            .max_by_key(|s| s.updated_at)
            .cloned()
    }
}
