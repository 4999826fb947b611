use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::JobwireError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub scheduler: SchedulerConfig,
    pub executor: ExecutorConfig,
    pub notify: NotifyConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `JOBWIRE_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("JOBWIRE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            scheduler: SchedulerConfig::from_env_profiled(p),
            executor: ExecutorConfig::from_env_profiled(p),
            notify: NotifyConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Reject settings the executor cannot start with.
    pub fn validate(&self) -> Result<(), JobwireError> {
        let addr = &self.scheduler.server_addr;
        if !(addr.starts_with("http://") || addr.starts_with("https://")) {
            return Err(JobwireError::Config(format!(
                "SERVER_ADDR must be an http(s) URL, got '{addr}'"
            )));
        }
        if self.executor.port == 0 {
            return Err(JobwireError::Config("EXECUTOR_PORT must be non-zero".into()));
        }
        if self.executor.registry_key.is_empty() {
            return Err(JobwireError::Config("REGISTRY_KEY must not be empty".into()));
        }
        if self.executor.heartbeat_interval_secs == 0 {
            return Err(JobwireError::Config(
                "HEARTBEAT_INTERVAL_SECS must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  scheduler:   addr={}, token={}, timeout={}s",
            self.scheduler.server_addr,
            if self.scheduler.access_token.is_empty() { "(none)" } else { "(set)" },
            self.scheduler.timeout_secs
        );
        tracing::info!(
            "  executor:    address={}, key={}, heartbeat={}s",
            self.executor.base_url(),
            self.executor.registry_key,
            self.executor.heartbeat_interval_secs
        );
        tracing::info!(
            "  notify:      kind={}, configured={}",
            self.notify.kind,
            self.notify.is_configured()
        );
    }

    /// Return a redacted view (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "scheduler": {
                "server_addr": self.scheduler.server_addr,
                "token_set": !self.scheduler.access_token.is_empty(),
                "timeout_secs": self.scheduler.timeout_secs,
            },
            "executor": {
                "address": self.executor.base_url(),
                "registry_key": self.executor.registry_key,
                "heartbeat_interval_secs": self.executor.heartbeat_interval_secs,
            },
            "notify": {
                "kind": self.notify.kind,
                "configured": self.notify.is_configured(),
            },
        })
    }
}

// ── Scheduler center ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Base URL of the scheduler center, without a trailing slash.
    pub server_addr: String,
    pub access_token: String,
    pub timeout_secs: u64,
}

impl SchedulerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            server_addr: profiled_env_or(p, "SERVER_ADDR", "http://127.0.0.1:8080/xxl-job-admin")
                .trim_end_matches('/')
                .to_string(),
            access_token: profiled_env_or(p, "ACCESS_TOKEN", ""),
            timeout_secs: profiled_env_u64(p, "CLIENT_TIMEOUT_SECS", 3),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Executor ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub ip: String,
    pub port: u16,
    pub registry_key: String,
    pub heartbeat_interval_secs: u64,
}

impl ExecutorConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            ip: profiled_env_or(p, "EXECUTOR_IP", "127.0.0.1"),
            port: profiled_env_u16(p, "EXECUTOR_PORT", 9999),
            registry_key: profiled_env_or(p, "REGISTRY_KEY", "jobwire-executor"),
            heartbeat_interval_secs: profiled_env_u64(p, "HEARTBEAT_INTERVAL_SECS", 20),
        }
    }

    /// `ip:port` this executor is reachable at.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// URL announced in every registry record.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.address())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

// ── Alerts ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// "robot" (signed card) or "webhook" (plain JSON).
    pub kind: String,
    pub webhook: Option<String>,
    pub secret: Option<String>,
}

impl NotifyConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            kind: profiled_env_or(p, "NOTIFY_KIND", "robot").to_lowercase(),
            webhook: profiled_env_opt(p, "NOTIFY_WEBHOOK"),
            secret: profiled_env_opt(p, "NOTIFY_SECRET"),
        }
    }

    pub fn is_configured(&self) -> bool {
        match self.kind.as_str() {
            "robot" => self.webhook.is_some() && self.secret.is_some(),
            "webhook" => self.webhook.is_some(),
            _ => false,
        }
    }
}
