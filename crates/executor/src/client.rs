//! Outbound calls to the scheduler center.

use async_trait::async_trait;
use jobwire_core::config::SchedulerConfig;
use jobwire_core::{CallbackRecord, RegistryRecord, ReturnT, ACCESS_TOKEN_HEADER};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("scheduler returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode scheduler response: {0}")]
    Decode(String),
}

/// The three calls an executor makes to the scheduler center.
///
/// A response with a non-success domain code is still `Ok`; callers inspect
/// [`ReturnT::is_success`].
#[async_trait]
pub trait SchedulerApi: Send + Sync {
    async fn registry(&self, record: &RegistryRecord) -> Result<ReturnT, SchedulerError>;
    async fn registry_remove(&self, record: &RegistryRecord) -> Result<ReturnT, SchedulerError>;
    async fn callback(&self, record: &CallbackRecord) -> Result<ReturnT, SchedulerError>;
}

pub struct SchedulerClient {
    client: reqwest::Client,
    base: String,
    access_token: String,
}

impl SchedulerClient {
    pub fn new(config: &SchedulerConfig) -> Result<Self, SchedulerError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            base: config.server_addr.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        action: &str,
        body: &T,
    ) -> Result<ReturnT, SchedulerError> {
        let url = format!("{}{}", self.base, action);
        debug!(%url, "scheduler request");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json;charset=UTF-8")
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(SchedulerError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| SchedulerError::Decode(format!("{e}: {text}")))
    }
}

#[async_trait]
impl SchedulerApi for SchedulerClient {
    async fn registry(&self, record: &RegistryRecord) -> Result<ReturnT, SchedulerError> {
        self.post("/api/registry", record).await
    }

    async fn registry_remove(&self, record: &RegistryRecord) -> Result<ReturnT, SchedulerError> {
        self.post("/api/registryRemove", record).await
    }

    /// The scheduler takes a batch; one terminal transition posts a batch of one.
    async fn callback(&self, record: &CallbackRecord) -> Result<ReturnT, SchedulerError> {
        self.post("/api/callback", std::slice::from_ref(record)).await
    }
}

/// In-memory scheduler center that records every call.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::sync::Mutex;

    use tokio::time::Instant;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SchedulerCall {
        Registry(RegistryRecord),
        RegistryRemove(RegistryRecord),
        Callback(CallbackRecord),
    }

    #[derive(Debug, Default)]
    pub struct MockScheduler {
        calls: Mutex<Vec<(Instant, SchedulerCall)>>,
        fail_transport: Mutex<bool>,
        reply: Mutex<Option<ReturnT>>,
    }

    impl MockScheduler {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every following call fails as if the scheduler were unreachable.
        pub fn set_unreachable(&self, unreachable: bool) {
            *self.fail_transport.lock().unwrap() = unreachable;
        }

        /// Answer every following call with `reply` instead of success.
        pub fn set_reply(&self, reply: ReturnT) {
            *self.reply.lock().unwrap() = Some(reply);
        }

        pub fn calls(&self) -> Vec<SchedulerCall> {
            self.calls.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
        }

        pub fn timed_calls(&self) -> Vec<(Instant, SchedulerCall)> {
            self.calls.lock().unwrap().clone()
        }

        pub fn callbacks(&self) -> Vec<CallbackRecord> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    SchedulerCall::Callback(r) => Some(r),
                    _ => None,
                })
                .collect()
        }

        pub fn registry_count(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, SchedulerCall::Registry(_)))
                .count()
        }

        fn record(&self, call: SchedulerCall) -> Result<ReturnT, SchedulerError> {
            self.calls.lock().unwrap().push((Instant::now(), call));
            if *self.fail_transport.lock().unwrap() {
                return Err(SchedulerError::Status {
                    status: 503,
                    body: "unreachable".to_string(),
                });
            }
            Ok(self
                .reply
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(ReturnT::success))
        }
    }

    #[async_trait]
    impl SchedulerApi for MockScheduler {
        async fn registry(&self, record: &RegistryRecord) -> Result<ReturnT, SchedulerError> {
            self.record(SchedulerCall::Registry(record.clone()))
        }

        async fn registry_remove(
            &self,
            record: &RegistryRecord,
        ) -> Result<ReturnT, SchedulerError> {
            self.record(SchedulerCall::RegistryRemove(record.clone()))
        }

        async fn callback(&self, record: &CallbackRecord) -> Result<ReturnT, SchedulerError> {
            self.record(SchedulerCall::Callback(record.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobwire_core::{RunRequest, FAILURE_CODE, SUCCESS_CODE};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> SchedulerConfig {
        SchedulerConfig {
            server_addr: format!("{}/xxl-job-admin/", server.uri()),
            access_token: "default_token".to_string(),
            timeout_secs: 3,
        }
    }

    #[tokio::test]
    async fn registry_posts_record_with_token() {
        let server = MockServer::start().await;
        let record = RegistryRecord::executor("demo-exec", "http://127.0.0.1:9999");
        Mock::given(method("POST"))
            .and(path("/xxl-job-admin/api/registry"))
            .and(header(ACCESS_TOKEN_HEADER, "default_token"))
            .and(body_json(serde_json::json!({
                "registryGroup": "EXECUTOR",
                "registryKey": "demo-exec",
                "registryValue": "http://127.0.0.1:9999",
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": 200})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = SchedulerClient::new(&config(&server)).unwrap();
        let resp = client.registry(&record).await.unwrap();
        assert!(resp.is_success());
    }

    #[tokio::test]
    async fn callback_posts_a_batch_of_one() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/xxl-job-admin/api/callback"))
            .and(body_json(serde_json::json!([{
                "jobId": 1,
                "logId": 0,
                "logDateTime": 0,
                "code": SUCCESS_CODE,
                "msg": "done",
            }])))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"code": 200, "msg": null})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = SchedulerClient::new(&config(&server)).unwrap();
        let record =
            CallbackRecord::for_request(&RunRequest::new(1, "demoJob"), SUCCESS_CODE, "done");
        assert!(client.callback(&record).await.unwrap().is_success());
    }

    #[tokio::test]
    async fn domain_failure_is_ok_with_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/xxl-job-admin/api/registryRemove"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"code": 500, "msg": "The access token is wrong."}),
            ))
            .mount(&server)
            .await;

        let client = SchedulerClient::new(&config(&server)).unwrap();
        let record = RegistryRecord::executor("demo-exec", "http://127.0.0.1:9999");
        let resp = client.registry_remove(&record).await.unwrap();
        assert_eq!(resp.code, FAILURE_CODE);
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = SchedulerClient::new(&config(&server)).unwrap();
        let record = RegistryRecord::executor("demo-exec", "http://127.0.0.1:9999");
        match client.registry(&record).await {
            Err(SchedulerError::Status { status, body }) => {
                assert_eq!(status, 502);
                assert_eq!(body, "bad gateway");
            }
            other => panic!("expected Status error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = SchedulerClient::new(&config(&server)).unwrap();
        let record = RegistryRecord::executor("demo-exec", "http://127.0.0.1:9999");
        assert!(matches!(
            client.registry(&record).await,
            Err(SchedulerError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_is_transport_error() {
        let client = SchedulerClient::new(&SchedulerConfig {
            server_addr: "http://127.0.0.1:1".to_string(),
            access_token: String::new(),
            timeout_secs: 1,
        })
        .unwrap();
        let record = RegistryRecord::executor("demo-exec", "http://127.0.0.1:9999");
        assert!(matches!(
            client.registry(&record).await,
            Err(SchedulerError::Transport(_))
        ));
    }
}
