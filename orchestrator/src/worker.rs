//! Parallel worker pool over pipeline jobs.
//!
//! Pool size defaults to `min(4, cpu count)`. Within a job, stages run
//! sequentially; across jobs, workers run independently, since the queue
//! already guarantees one in-flight job per key.

use crate::pipeline::{PipelineDeps, run_pipeline};
use crate::queue::JobQueue;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
    deps: Arc<PipelineDeps>,
}

impl WorkerPool {
    pub fn default_workers() -> usize {
        num_cpus::get().clamp(1, 4)
    }

    pub fn start(queue: Arc<JobQueue>, deps: Arc<PipelineDeps>, workers: usize) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let queue = queue.clone();
                let deps = deps.clone();
                let mut rx = rx.clone();
                tokio::spawn(async move {
                    debug!(worker_id, "worker started");
                    loop {
                        tokio::select! {
                            changed = rx.changed() => {
                                if changed.is_err() || *rx.borrow() {
                                    break;
                                }
                            }
                            job = queue.next() => {
                                let key = job.key.clone();
                                let outcome = run_pipeline(&deps, job).await;
                                debug!(worker_id, %key, ?outcome, "job finished");
                                queue.complete(&key);
                            }
                        }
                    }
                    debug!(worker_id, "worker stopped");
                })
            })
            .collect();
        info!(workers = workers.max(1), "worker pool started");
        Self {
            handles,
            shutdown,
            deps,
        }
    }

    /// Signal shutdown: in-flight jobs stop at the next stage boundary.
    pub fn shutdown(&self) {
        self.deps.cancelled.store(true, Ordering::Relaxed);
        let _ = self.shutdown.send(true);
    }

    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
