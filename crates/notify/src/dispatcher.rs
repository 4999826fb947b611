//! Routes alerts to configured channels.
//!
//! The dispatcher delivers each notification to every configured channel.
//! Individual channel failures don't block other channels, and callers that
//! use [`Dispatcher::fire`] never observe delivery failures at all.

use std::sync::Arc;

use jobwire_core::config::NotifyConfig;

use crate::robot::RobotNotifier;
use crate::traits::{DispatchResult, Notification, Notifier, NotifyError};
use crate::webhook::WebhookNotifier;

/// Dispatches notifications to all configured channels.
#[derive(Default)]
pub struct Dispatcher {
    channels: Vec<Arc<dyn Notifier>>,
}

impl Dispatcher {
    /// Create a dispatcher with no channels; every alert is dropped.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_channels(channels: Vec<Arc<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Build the single channel described by the environment config.
    ///
    /// An unconfigured channel yields an empty dispatcher rather than an error.
    pub fn from_config(config: &NotifyConfig) -> Result<Self, NotifyError> {
        if !matches!(config.kind.as_str(), "robot" | "webhook") {
            return Err(NotifyError::Config(format!(
                "unknown alert channel kind: {}",
                config.kind
            )));
        }
        if !config.is_configured() {
            tracing::info!(kind = %config.kind, "No alert channel configured, alerts disabled");
            return Ok(Self::empty());
        }
        let webhook = config.webhook.clone().unwrap_or_default();
        let channel: Arc<dyn Notifier> = if config.kind == "robot" {
            Arc::new(RobotNotifier::new(
                webhook,
                config.secret.clone().unwrap_or_default(),
            )?)
        } else {
            let mut notifier = WebhookNotifier::new(webhook)?;
            if let Some(secret) = config.secret.as_deref() {
                notifier = notifier.with_bearer(secret)?;
            }
            Arc::new(notifier)
        };
        Ok(Self::with_channels(vec![channel]))
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Deliver a notification to every channel and report per-channel results.
    pub async fn dispatch(&self, notification: &Notification) -> Vec<DispatchResult> {
        if self.channels.is_empty() {
            tracing::debug!(title = %notification.title, "No alert channels configured");
            return Vec::new();
        }

        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let start = std::time::Instant::now();
            let result = channel.send(notification).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, error) = match result {
                Ok(()) => {
                    tracing::info!(
                        channel = channel.channel_name(),
                        title = %notification.title,
                        duration_ms,
                        "Alert delivered"
                    );
                    (true, None)
                }
                Err(e) => {
                    tracing::warn!(
                        channel = channel.channel_name(),
                        title = %notification.title,
                        error = %e,
                        duration_ms,
                        "Alert delivery failed"
                    );
                    (false, Some(e.to_string()))
                }
            };

            results.push(DispatchResult {
                channel: channel.channel_name().to_string(),
                success,
                error,
                duration_ms,
            });
        }

        results
    }

    /// Deliver in the background. Failures are logged and otherwise ignored.
    pub fn fire(self: &Arc<Self>, notification: Notification) {
        if self.channels.is_empty() {
            return;
        }
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            dispatcher.dispatch(&notification).await;
        });
    }
}
