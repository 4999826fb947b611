//! Tasks: a job id bound to a registered work function.
//!
//! A [`Task`] starts life as a registered *template* (handler name plus work
//! function) and becomes a running *instance* when [`Task::bind`] attaches the
//! run request, a fresh cancellation token and an optional deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobwire_core::{RunRequest, FAILURE_CODE, SUCCESS_CODE};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AdmissionError;

/// Failure reported by a work function.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("{0}")]
    Failed(String),
}

impl JobError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Everything a work function gets to see about its own invocation.
///
/// Cancellation is cooperative: the function must poll [`is_cancelled`] or
/// select on [`cancelled`] to stop early. The token fires on kill, on a
/// `COVER_EARLY` override, and when the deadline passes.
///
/// [`is_cancelled`]: JobContext::is_cancelled
/// [`cancelled`]: JobContext::cancelled
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: i64,
    pub handler: String,
    /// `"{handler}:{job_id}"`, stable for the lifetime of one run.
    pub trace_id: String,
    pub request: Arc<RunRequest>,
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl JobContext {
    pub fn params(&self) -> &str {
        &self.request.executor_params
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the task has been cancelled or its deadline has passed.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// A child token for handing to sub-tasks spawned by the work function.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

/// A registered work function.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run the job. `Ok` carries the message reported in the callback.
    async fn execute(&self, ctx: JobContext) -> Result<String, JobError>;
}

/// Adapter turning an async closure into a [`JobHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, JobError>> + Send + 'static,
{
    async fn execute(&self, ctx: JobContext) -> Result<String, JobError> {
        (self.0)(ctx).await
    }
}

/// Wrap an async closure as a shareable handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn JobHandler>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, JobError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Terminal state of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The work function returned `Ok`.
    Completed(String),
    /// The work function returned `Err` or panicked.
    Failed(String),
    /// Killed or replaced by a `COVER_EARLY` admission.
    Cancelled,
    /// The deadline passed before the work function returned.
    TimedOut { timeout_secs: i64 },
}

impl TaskOutcome {
    pub fn code(&self) -> i64 {
        match self {
            Self::Completed(_) => SUCCESS_CODE,
            _ => FAILURE_CODE,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Completed(msg) => msg.clone(),
            Self::Failed(reason) => format!("task failed: {reason}"),
            Self::Cancelled => "task cancelled".to_string(),
            Self::TimedOut { timeout_secs } => format!("task timeout after {timeout_secs}s"),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
            Self::TimedOut { .. } => "timed_out",
        }
    }
}

/// A template in the handler registry, or a live instance in the running table.
#[derive(Clone)]
pub struct Task {
    pub id: i64,
    pub name: String,
    request: Option<Arc<RunRequest>>,
    handler: Arc<dyn JobHandler>,
    token: CancellationToken,
    deadline: Option<Instant>,
    instance: u64,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("instance", &self.instance)
            .field("cancelled", &self.token.is_cancelled())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Task {
    /// A registry entry: a named work function with no run bound to it yet.
    pub fn template(name: impl Into<String>, handler: Arc<dyn JobHandler>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            request: None,
            handler,
            token: CancellationToken::new(),
            deadline: None,
            instance: 0,
        }
    }

    /// Copy this template into a running instance for `request`.
    ///
    /// The deadline only exists when `executor_timeout > 0`. A timeout too
    /// large to place on the clock is rejected and nothing is bound.
    pub fn bind(&self, request: RunRequest, instance: u64) -> Result<Self, AdmissionError> {
        let deadline = match request.executor_timeout {
            secs if secs <= 0 => None,
            secs => Some(
                Instant::now()
                    .checked_add(Duration::from_secs(secs as u64))
                    .ok_or(AdmissionError::InvalidTimeout {
                        job_id: request.job_id,
                        timeout_secs: secs,
                    })?,
            ),
        };
        Ok(Self {
            id: request.job_id,
            name: request.executor_handler.clone(),
            request: Some(Arc::new(request)),
            handler: Arc::clone(&self.handler),
            token: CancellationToken::new(),
            deadline,
            instance,
        })
    }

    /// Revoke the task. Safe to call any number of times.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn timeout_secs(&self) -> i64 {
        self.request.as_ref().map_or(0, |r| r.executor_timeout)
    }

    pub fn params(&self) -> &str {
        self.request
            .as_ref()
            .map_or("", |r| r.executor_params.as_str())
    }

    pub fn request(&self) -> Option<&Arc<RunRequest>> {
        self.request.as_ref()
    }

    pub fn handler(&self) -> &Arc<dyn JobHandler> {
        &self.handler
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The context handed to the work function of a bound instance.
    pub fn context(&self) -> JobContext {
        let request = self
            .request
            .clone()
            .unwrap_or_else(|| Arc::new(RunRequest::new(self.id, self.name.clone())));
        JobContext {
            job_id: self.id,
            handler: self.name.clone(),
            trace_id: format!("{}:{}", self.name, self.id),
            request,
            token: self.token.clone(),
            deadline: self.deadline,
        }
    }
}
