use jobwire_core::{JobwireError, ReturnT};
use jobwire_notify::NotifyError;

use crate::client::SchedulerError;

/// Why a run, kill or idle-beat request was turned down.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("There are tasks running")]
    Conflict { job_id: i64 },

    #[error("job {job_id} is not running")]
    NotRunning { job_id: i64 },

    #[error("Task not registered")]
    NotRegistered { handler: String },

    #[error("params err: executorTimeout {timeout_secs} is out of range")]
    InvalidTimeout { job_id: i64, timeout_secs: i64 },
}

/// Errors surfaced by the executor control plane.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("params err: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error("The access token is wrong.")]
    Unauthorized,

    #[error("scheduler client setup failed: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("alert channel setup failed: {0}")]
    Notify(#[from] NotifyError),
}

impl ExecutorError {
    /// The `{code:500, msg}` body every handler error becomes.
    pub fn to_return(&self) -> ReturnT {
        ReturnT::failure(self.to_string())
    }
}

impl From<JobwireError> for ExecutorError {
    fn from(e: JobwireError) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}
