//! Minijinja template rendering for job alerts.
//!
//! Every alert kind ships with a default title and body template. Bodies can
//! be overridden per kind; overrides are validated when installed.

use std::collections::HashMap;

use crate::traits::{Notification, NotifyError};

/// What went wrong with a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// The callback could not reach the scheduler center.
    CallbackFailed,
    /// The work function reported failure.
    ExecutionFailed,
    /// The work function ran past its deadline.
    Timeout,
}

impl AlertKind {
    pub fn title(self) -> &'static str {
        match self {
            Self::CallbackFailed => "task callback failed alert",
            Self::ExecutionFailed => "task execution failed alert",
            Self::Timeout => "task timeout alert",
        }
    }

    fn default_body(self) -> &'static str {
        match self {
            Self::CallbackFailed | Self::ExecutionFailed => DEFAULT_FAILURE_BODY,
            Self::Timeout => DEFAULT_TIMEOUT_BODY,
        }
    }
}

const DEFAULT_FAILURE_BODY: &str = "hostname: [{{ host }}]\n\
taskID: {{ job_id }}\n\
task name: {{ job_name }}\n\
task params: {{ params }}\n\
failed reason: {{ reason }}";

const DEFAULT_TIMEOUT_BODY: &str = "hostname: [{{ host }}]\n\
taskID: {{ job_id }}\n\
task name: {{ job_name }}\n\
task params: {{ params }}\n\
timeout: {{ timeout_secs }}s";

/// Context data available to alert templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobAlertContext {
    pub job_id: i64,
    pub job_name: String,
    pub params: String,
    pub reason: String,
    pub timeout_secs: i64,
    pub host: String,
}

impl JobAlertContext {
    pub fn new(job_id: i64, job_name: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            job_id,
            job_name: job_name.into(),
            params: params.into(),
            reason: String::new(),
            timeout_secs: 0,
            host: local_hostname(),
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn timeout_secs(mut self, secs: i64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

fn local_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Renders alert templates using minijinja.
///
/// A fresh [`minijinja::Environment`] is created per render call since
/// templates are dynamic strings, not pre-registered files.
#[derive(Debug, Default)]
pub struct AlertRenderer {
    overrides: HashMap<AlertKind, String>,
}

impl AlertRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the body template for one alert kind.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template has syntax errors.
    pub fn with_body_template(
        mut self,
        kind: AlertKind,
        template: impl Into<String>,
    ) -> Result<Self, NotifyError> {
        let template = template.into();
        self.validate(&template)?;
        self.overrides.insert(kind, template);
        Ok(self)
    }

    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_filter("upper", upper_filter);
        env.add_function("env", env_function);
        env
    }

    /// Render a template string with the given context.
    pub fn render(&self, template_str: &str, ctx: &JobAlertContext) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Validate that a template string parses without errors.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }

    /// Build the broadcast notification for a job alert.
    pub fn render_alert(
        &self,
        kind: AlertKind,
        ctx: &JobAlertContext,
    ) -> Result<Notification, NotifyError> {
        let template = self
            .overrides
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.default_body());
        let body = self.render(template, ctx)?;
        Ok(Notification::new(kind.title(), body)
            .broadcast(true)
            .with_meta("job_id", ctx.job_id.to_string())
            .with_meta("alert", format!("{kind:?}")))
    }
}

fn upper_filter(value: String) -> String {
    value.to_uppercase()
}

/// Global function: read an environment variable by name, empty if unset.
fn env_function(name: String) -> String {
    match std::env::var(&name) {
        Ok(val) => val,
        Err(_) => {
            tracing::warn!(var = %name, "Environment variable not found, returning empty string");
            String::new()
        }
    }
}
