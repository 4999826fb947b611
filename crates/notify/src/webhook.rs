//! Plain JSON webhook notifier.
//!
//! Posts `{title, text, broadcast, metadata}` to a URL. When a secret is
//! configured it travels as a bearer token.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::traits::{Notification, Notifier, NotifyError};

#[derive(Debug)]
pub struct WebhookNotifier {
    url: String,
    headers: HeaderMap,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(NotifyError::Config(format!(
                "webhook URL must be http(s), got '{url}'"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()?;
        Ok(Self {
            url,
            headers: HeaderMap::new(),
            client,
        })
    }

    /// Send `Authorization: Bearer {secret}` with every alert.
    pub fn with_bearer(mut self, secret: &str) -> Result<Self, NotifyError> {
        let value = HeaderValue::from_str(&format!("Bearer {secret}"))
            .map_err(|e| NotifyError::Config(format!("invalid webhook secret: {e}")))?;
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    pub fn payload(notification: &Notification) -> serde_json::Value {
        serde_json::json!({
            "title": notification.title,
            "text": notification.body,
            "broadcast": notification.broadcast,
            "metadata": notification.metadata,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .json(&Self::payload(notification))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                url = %self.url,
                %status,
                body = %body_text,
                "webhook returned non-2xx status"
            );
            return Err(NotifyError::Config(format!(
                "webhook returned {status}: {body_text}"
            )));
        }

        tracing::debug!(url = %self.url, %status, "webhook alert delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}
