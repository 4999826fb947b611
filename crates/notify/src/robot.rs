//! Signed chat-robot notifier.
//!
//! Posts an interactive card to a group-robot webhook. Each request is signed
//! with HMAC-SHA256 keyed by `"{timestamp}\n{secret}"` over an empty message,
//! base64 encoded, which is what the robot endpoint verifies.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::traits::{Notification, Notifier, NotifyError};

type HmacSha256 = Hmac<Sha256>;

const MENTION_ALL: &str = "<at user_id=\"all\">all</at>";

/// Compute the robot signature for a unix timestamp (seconds).
pub fn sign(secret: &str, timestamp: i64) -> Result<String, NotifyError> {
    let key = format!("{timestamp}\n{secret}");
    let mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| NotifyError::Signing(e.to_string()))?;
    let digest = mac.finalize().into_bytes();
    Ok(base64::engine::general_purpose::STANDARD.encode(digest))
}

/// Delivers alerts as signed interactive cards.
#[derive(Debug)]
pub struct RobotNotifier {
    webhook: String,
    secret: String,
    client: reqwest::Client,
}

impl RobotNotifier {
    /// Both the webhook URL and the signing secret are required.
    pub fn new(webhook: String, secret: String) -> Result<Self, NotifyError> {
        if webhook.is_empty() || secret.is_empty() {
            return Err(NotifyError::Config(
                "robot notifier needs both webhook and secret".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()?;
        Ok(Self {
            webhook,
            secret,
            client,
        })
    }

    /// Build the card payload for a notification at the given timestamp.
    pub fn card_payload(
        &self,
        notification: &Notification,
        timestamp: i64,
    ) -> Result<serde_json::Value, NotifyError> {
        let mut content = notification.body.clone();
        let template = if notification.broadcast {
            content.push_str(MENTION_ALL);
            "red"
        } else {
            "blue"
        };

        Ok(serde_json::json!({
            "msg_type": "interactive",
            "timestamp": timestamp.to_string(),
            "sign": sign(&self.secret, timestamp)?,
            "card": {
                "config": { "wide_screen_mode": true, "enable_forward": true },
                "header": {
                    "template": template,
                    "title": { "tag": "plain_text", "content": notification.title },
                },
                "elements": [ { "tag": "markdown", "content": content } ],
            },
        }))
    }
}

#[async_trait::async_trait]
impl Notifier for RobotNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = self.card_payload(notification, chrono::Utc::now().timestamp())?;

        let response = self
            .client
            .post(&self.webhook)
            .header(reqwest::header::CONTENT_TYPE, "application/json;charset=UTF-8")
            .json(&payload)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(%status, body = %body_text, "robot webhook returned non-2xx status");
            return Err(NotifyError::Config(format!(
                "robot webhook returned {status}: {body_text}"
            )));
        }

        tracing::debug!(%status, title = %notification.title, "robot alert delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "robot"
    }
}
