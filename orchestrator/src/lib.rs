//! Orchestrator: trigger ingestion, coalescing queue, worker pool and the
//! per-commit pipeline state machine.

pub mod errors;
pub mod job;
pub mod pipeline;
pub mod queue;
pub mod status;
pub mod worker;

use job::{JobKey, PipelineJob};
use queue::{EnqueueResult, JobQueue};
use status::RunStatus;
use std::sync::{Arc, Mutex};
use tracing::info;
use worker::WorkerPool;

pub use pipeline::{PipelineDeps, StageDeadlines, run_pipeline};
pub use status::{RunOutcome, Stage, StatusRegistry};

/// Shared orchestrator handle; cheap to clone into HTTP state.
#[derive(Clone)]
pub struct Orchestrator {
    queue: Arc<JobQueue>,
    deps: Arc<PipelineDeps>,
    pool: Arc<Mutex<Option<WorkerPool>>>,
}

impl Orchestrator {
    pub fn new(deps: PipelineDeps) -> Self {
        Self {
            queue: Arc::new(JobQueue::new()),
            deps: Arc::new(deps),
            pool: Arc::new(Mutex::new(None)),
        }
    }

    /// Spin up the worker pool; idempotent.
    pub fn start(&self, workers: usize) {
        let mut slot = self.pool.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(WorkerPool::start(
                self.queue.clone(),
                self.deps.clone(),
                workers,
            ));
            info!(workers, "orchestrator started");
        }
    }

    pub fn enqueue(&self, job: PipelineJob) -> EnqueueResult {
        info!(key = %job.key, "pipeline trigger accepted");
        self.queue.enqueue(job)
    }

    pub fn status_for(&self, key: &JobKey) -> Option<RunStatus> {
        self.deps.registry.latest_for(key)
    }

    pub fn deps(&self) -> &PipelineDeps {
        &self.deps
    }

    pub fn shutdown(&self) {
        if let Ok(slot) = self.pool.lock() {
            if let Some(pool) = slot.as_ref() {
                pool.shutdown();
            }
        }
    }
}
