//! The executor: handler registry, running table and the control operations
//! the scheduler center invokes over HTTP.

use std::sync::Arc;
use std::time::Duration;

use jobwire_core::{
    CallbackRecord, Config, LogRequest, LogResponse, RegistryRecord, ReturnT, RunRequest,
};
use jobwire_notify::{AlertKind, AlertRenderer, Dispatcher, JobAlertContext};
use tracing::{error, info, warn};

use crate::admission::AdmissionController;
use crate::client::{SchedulerApi, SchedulerClient};
use crate::error::{AdmissionError, ExecutorError};
use crate::heartbeat::Heartbeat;
use crate::log::{self, LogHandler};
use crate::runner;
use crate::table::TaskTable;
use crate::task::{JobHandler, Task, TaskOutcome};

const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Outcome messages containing one of these markers raise an execution alert.
const FAILURE_MARKERS: [&str; 2] = ["fail", "error"];

pub struct ExecutorBuilder {
    scheduler: Arc<dyn SchedulerApi>,
    registry_key: String,
    address: String,
    heartbeat_interval: Duration,
    access_token: String,
    alerts: Dispatcher,
    renderer: AlertRenderer,
    log_handler: Option<Arc<dyn LogHandler>>,
}

impl ExecutorBuilder {
    /// Token required on inbound control calls. Empty disables the check.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = token.into();
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn alerts(mut self, alerts: Dispatcher) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn renderer(mut self, renderer: AlertRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn log_handler(mut self, handler: Arc<dyn LogHandler>) -> Self {
        self.log_handler = Some(handler);
        self
    }

    pub fn build(self) -> Arc<Executor> {
        Arc::new(Executor {
            handlers: TaskTable::new(),
            admission: AdmissionController::new(),
            scheduler: self.scheduler,
            alerts: Arc::new(self.alerts),
            renderer: self.renderer,
            log_handler: self.log_handler,
            access_token: self.access_token,
            registry_key: self.registry_key,
            address: self.address,
            heartbeat_interval: self.heartbeat_interval,
        })
    }
}

pub struct Executor {
    handlers: TaskTable,
    admission: AdmissionController,
    scheduler: Arc<dyn SchedulerApi>,
    alerts: Arc<Dispatcher>,
    renderer: AlertRenderer,
    log_handler: Option<Arc<dyn LogHandler>>,
    access_token: String,
    registry_key: String,
    address: String,
    heartbeat_interval: Duration,
}

impl Executor {
    pub fn builder(
        scheduler: Arc<dyn SchedulerApi>,
        registry_key: impl Into<String>,
        address: impl Into<String>,
    ) -> ExecutorBuilder {
        ExecutorBuilder {
            scheduler,
            registry_key: registry_key.into(),
            address: address.into(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            access_token: String::new(),
            alerts: Dispatcher::empty(),
            renderer: AlertRenderer::new(),
            log_handler: None,
        }
    }

    /// Wire an executor to the scheduler client and alert channel in `config`.
    pub fn from_config(config: &Config) -> Result<ExecutorBuilder, ExecutorError> {
        let scheduler: Arc<dyn SchedulerApi> = Arc::new(SchedulerClient::new(&config.scheduler)?);
        Ok(Self::builder(
            scheduler,
            config.executor.registry_key.clone(),
            config.executor.base_url(),
        )
        .access_token(config.scheduler.access_token.clone())
        .heartbeat_interval(config.executor.heartbeat_interval())
        .alerts(Dispatcher::from_config(&config.notify)?))
    }

    /// Register a work function under `name`. A later call with the same name
    /// replaces the earlier one.
    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn JobHandler>) {
        let name = name.into();
        info!(handler = %name, "Handler registered");
        self.handlers.set(name.clone(), Task::template(name, handler));
    }

    pub fn handler_names(&self) -> Vec<String> {
        self.handlers.keys()
    }

    /// Admit `request` and start its work function in the background.
    ///
    /// Returns as soon as the task is admitted; completion is reported to the
    /// scheduler through the callback.
    pub fn run(self: &Arc<Self>, request: RunRequest) -> Result<(), ExecutorError> {
        let job_id = request.job_id;
        let Some(template) = self.handlers.get(&request.executor_handler) else {
            error!(job_id, handler = %request.executor_handler, "Task not registered");
            return Err(AdmissionError::NotRegistered {
                handler: request.executor_handler,
            }
            .into());
        };

        let task = self.admission.admit(&template, request)?;
        info!(
            job_id,
            handler = %task.name,
            instance = task.instance(),
            timeout_secs = task.timeout_secs(),
            params = %task.params(),
            "Task admitted"
        );

        let executor = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = runner::drive(&task).await;
            executor.finish(&task, outcome).await;
        });
        Ok(())
    }

    /// Release the running entry and report the outcome to the scheduler.
    async fn finish(&self, task: &Task, outcome: TaskOutcome) {
        self.admission.release(task);
        info!(
            job_id = task.id,
            handler = %task.name,
            outcome = outcome.label(),
            "Task finished"
        );
        let Some(request) = task.request() else {
            return;
        };

        let alert_context = JobAlertContext::new(task.id, task.name.clone(), task.params());
        if let TaskOutcome::TimedOut { timeout_secs } = outcome {
            self.alert(
                AlertKind::Timeout,
                alert_context.clone().timeout_secs(timeout_secs),
            );
        }

        let message = outcome.message();
        let record = CallbackRecord::for_request(request, outcome.code(), message.clone());
        match self.scheduler.callback(&record).await {
            Ok(resp) => info!(
                job_id = task.id,
                code = resp.code,
                msg = ?resp.msg,
                "Task callback success"
            ),
            Err(e) => {
                warn!(job_id = task.id, error = %e, "Task callback failed");
                self.alert(
                    AlertKind::CallbackFailed,
                    alert_context.clone().reason(e.to_string()),
                );
            }
        }

        let lower = message.to_lowercase();
        if FAILURE_MARKERS.iter().any(|marker| lower.contains(marker)) {
            self.alert(AlertKind::ExecutionFailed, alert_context.reason(message));
        }
    }

    fn alert(&self, kind: AlertKind, ctx: JobAlertContext) {
        match self.renderer.render_alert(kind, &ctx) {
            Ok(notification) => self.alerts.fire(notification),
            Err(e) => warn!(job_id = ctx.job_id, error = %e, "Alert could not be rendered"),
        }
    }

    pub fn kill(&self, job_id: i64) -> Result<(), ExecutorError> {
        let task = self.admission.kill(job_id).inspect_err(|_| {
            error!(job_id, "Kill rejected, task not running");
        })?;
        info!(job_id, instance = task.instance(), "Task killed");
        Ok(())
    }

    /// Succeeds only when nothing is running under `job_id`.
    pub fn idle_beat(&self, job_id: i64) -> Result<(), ExecutorError> {
        if self.admission.is_idle(job_id) {
            Ok(())
        } else {
            Err(AdmissionError::Conflict { job_id }.into())
        }
    }

    pub fn beat(&self) -> ReturnT {
        ReturnT::success()
    }

    pub fn ping(&self) -> ReturnT {
        ReturnT::success()
    }

    pub async fn query_log(&self, request: &LogRequest) -> LogResponse {
        match &self.log_handler {
            Some(handler) => handler.query(request).await,
            None => log::unsupported(request),
        }
    }

    pub fn is_running(&self, job_id: i64) -> bool {
        !self.admission.is_idle(job_id)
    }

    pub fn running_count(&self) -> usize {
        self.admission.running().len()
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn registry_record(&self) -> RegistryRecord {
        RegistryRecord::executor(&self.registry_key, &self.address)
    }

    pub fn heartbeat(&self) -> Heartbeat {
        Heartbeat::new(
            Arc::clone(&self.scheduler),
            self.registry_key.clone(),
            self.address.clone(),
            self.heartbeat_interval,
        )
    }

    /// De-register from the scheduler. Running tasks are left alone.
    pub async fn stop(&self) {
        self.heartbeat().deregister().await;
    }
}
