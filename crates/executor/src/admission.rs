//! Admission control for run, kill and idle-beat requests.
//!
//! Every read-modify-write of the running table happens inside one gate, so
//! two concurrent run requests for the same job id can never both observe
//! "absent" and double-admit. The sections are short and never await, so a
//! blocking mutex is used.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use jobwire_core::{BlockStrategy, RunRequest};

use crate::error::AdmissionError;
use crate::table::{job_key, TaskTable};
use crate::task::Task;

#[derive(Debug, Default)]
pub struct AdmissionController {
    running: TaskTable,
    gate: Mutex<()>,
    next_instance: AtomicU64,
}

impl AdmissionController {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `request` to `template` and store it as the running instance.
    ///
    /// With `COVER_EARLY` an existing instance is cancelled and replaced.
    /// Any other strategy rejects with [`AdmissionError::Conflict`] and leaves
    /// the table untouched, as does a timeout that cannot be scheduled.
    pub fn admit(&self, template: &Task, request: RunRequest) -> Result<Task, AdmissionError> {
        let _gate = self.lock();
        let job_id = request.job_id;
        let key = job_key(job_id);

        let existing = self.running.get(&key);
        if existing.is_some() && request.executor_block_strategy == BlockStrategy::Discard {
            tracing::error!(job_id, "Run rejected, task already running");
            return Err(AdmissionError::Conflict { job_id });
        }

        // A failed bind must leave the previous instance running.
        let instance = self.next_instance.fetch_add(1, Ordering::Relaxed) + 1;
        let task = template.bind(request, instance)?;

        if let Some(existing) = existing {
            existing.cancel();
            self.running.delete(&key);
            tracing::info!(
                job_id,
                replaced_instance = existing.instance(),
                "Running task cancelled by COVER_EARLY"
            );
        }
        self.running.set(key, task.clone());
        Ok(task)
    }

    /// Cancel and remove the running instance of `job_id`.
    pub fn kill(&self, job_id: i64) -> Result<Task, AdmissionError> {
        let _gate = self.lock();
        let task = self
            .running
            .delete(&job_key(job_id))
            .ok_or(AdmissionError::NotRunning { job_id })?;
        task.cancel();
        Ok(task)
    }

    /// `true` when nothing is running under `job_id`.
    pub fn is_idle(&self, job_id: i64) -> bool {
        let _gate = self.lock();
        !self.running.exists(&job_key(job_id))
    }

    /// Remove `task` after it reached a terminal state.
    ///
    /// Only the same admission is removed; an entry that has since been
    /// replaced is left alone. Returns whether anything was removed.
    pub fn release(&self, task: &Task) -> bool {
        let _gate = self.lock();
        self.running
            .delete_if(&job_key(task.id), |t| t.instance() == task.instance())
            .is_some()
    }

    pub fn running(&self) -> &TaskTable {
        &self.running
    }
}
