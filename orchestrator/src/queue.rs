//! Bounded coalescing job queue.
//!
//! Keyed by `(project_id, commit_id)`. A newer trigger for a key that is
//! still pending replaces the pending payload; a trigger for a key that is
//! in flight queues exactly one re-run. At most one job per key runs at any
//! time.

use crate::job::{JobKey, PipelineJob};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, PartialEq, Eq)]
pub enum EnqueueResult {
    /// New pending slot created.
    Queued,
    /// Replaced the payload of an existing pending slot.
    Coalesced,
}

#[derive(Default)]
struct QueueState {
    order: VecDeque<JobKey>,
    pending: HashMap<JobKey, PipelineJob>,
    running: HashSet<JobKey>,
}

#[derive(Default)]
pub struct JobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, job: PipelineJob) -> EnqueueResult {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let key = job.key.clone();
        let result = if state.pending.contains_key(&key) {
            // Newest payload wins; the slot keeps its queue position.
            state.pending.insert(key.clone(), job);
            debug!(%key, "trigger coalesced into pending slot");
            EnqueueResult::Coalesced
        } else {
            state.order.push_back(key.clone());
            state.pending.insert(key.clone(), job);
            debug!(%key, "job queued");
            EnqueueResult::Queued
        };
        drop(state);
        self.notify.notify_waiters();
        result
    }

    /// Next runnable job: first pending key whose key is not in flight.
    /// Waits when nothing is runnable.
    pub async fn next(&self) -> PipelineJob {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register interest before the state check so an enqueue between
            // the check and the await cannot be missed.
            notified.as_mut().enable();
            if let Some(job) = self.try_next() {
                return job;
            }
            notified.await;
        }
    }

    /// Non-blocking variant of [`next`], for tests and drain loops.
    pub fn try_next(&self) -> Option<PipelineJob> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let pos = state
            .order
            .iter()
            .position(|k| !state.running.contains(k) && state.pending.contains_key(k))?;
        let key = state.order.remove(pos).unwrap();
        let job = state.pending.remove(&key).unwrap();
        state.running.insert(key);
        Some(job)
    }

    /// Mark a job finished. A re-queued key becomes runnable again.
    pub fn complete(&self, key: &JobKey) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.running.remove(key);
        let runnable_again = state.pending.contains_key(key);
        drop(state);
        if runnable_again {
            self.notify.notify_waiters();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending
            .len()
    }

    pub fn running_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .running
            .len()
    }
}
