//! Wire types exchanged with the scheduler center.
//!
//! Every response body carries a domain `code` independent of the HTTP status:
//! [`SUCCESS_CODE`] or [`FAILURE_CODE`]. Field names follow the scheduler's
//! camelCase JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::JobwireError;

/// Domain code for a successful call.
pub const SUCCESS_CODE: i64 = 200;
/// Domain code for a failed call.
pub const FAILURE_CODE: i64 = 500;

/// Header carrying the static access token on both inbound and outbound calls.
pub const ACCESS_TOKEN_HEADER: &str = "XXL-JOB-ACCESS-TOKEN";

/// Registry group announced by every executor.
pub const REGISTRY_GROUP: &str = "EXECUTOR";

/// Parse a JSON request body.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, JobwireError> {
    Ok(serde_json::from_slice(body)?)
}

// ── Generic response ──────────────────────────────────────────

/// The `{code, msg}` envelope returned by every control endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnT {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
}

impl ReturnT {
    pub fn success() -> Self {
        Self {
            code: SUCCESS_CODE,
            msg: None,
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            code: FAILURE_CODE,
            msg: Some(msg.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

// ── Run ───────────────────────────────────────────────────────

/// Policy applied when a run request targets a job id that is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum BlockStrategy {
    /// Cancel the running instance and admit the new one.
    #[serde(rename = "COVER_EARLY")]
    CoverEarly,
    /// Reject the new request and keep the running instance.
    #[default]
    #[serde(rename = "DISCARD_LATER")]
    Discard,
}

impl BlockStrategy {
    /// Map the scheduler's wire string. Only `COVER_EARLY` overrides; every
    /// other value (serial execution included) rejects on conflict.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "COVER_EARLY" => Self::CoverEarly,
            _ => Self::Discard,
        }
    }
}

impl<'de> Deserialize<'de> for BlockStrategy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Self::from_wire).unwrap_or_default())
    }
}

/// Body of `POST /run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub job_id: i64,
    pub executor_handler: String,
    #[serde(default)]
    pub executor_params: String,
    #[serde(default)]
    pub executor_block_strategy: BlockStrategy,
    /// Seconds; `0` means no deadline.
    #[serde(default)]
    pub executor_timeout: i64,
    #[serde(default)]
    pub log_id: i64,
    #[serde(default)]
    pub log_date_time: i64,
    #[serde(default)]
    pub glue_type: Option<String>,
    #[serde(default)]
    pub glue_source: Option<String>,
    #[serde(default)]
    pub glue_updatetime: i64,
    #[serde(default)]
    pub broadcast_index: i64,
    #[serde(default)]
    pub broadcast_total: i64,
}

impl RunRequest {
    /// Minimal request for a handler, as the scheduler would send it.
    pub fn new(job_id: i64, handler: impl Into<String>) -> Self {
        Self {
            job_id,
            executor_handler: handler.into(),
            executor_params: String::new(),
            executor_block_strategy: BlockStrategy::Discard,
            executor_timeout: 0,
            log_id: 0,
            log_date_time: 0,
            glue_type: None,
            glue_source: None,
            glue_updatetime: 0,
            broadcast_index: 0,
            broadcast_total: 0,
        }
    }

    pub fn with_params(mut self, params: impl Into<String>) -> Self {
        self.executor_params = params.into();
        self
    }

    pub fn with_strategy(mut self, strategy: BlockStrategy) -> Self {
        self.executor_block_strategy = strategy;
        self
    }

    pub fn with_timeout(mut self, seconds: i64) -> Self {
        self.executor_timeout = seconds;
        self
    }
}

/// Body of `POST /kill`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillRequest {
    #[serde(rename = "jobId")]
    pub job_id: i64,
}

/// Body of `POST /idleBeat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleBeatRequest {
    #[serde(rename = "jobId")]
    pub job_id: i64,
}

// ── Log ───────────────────────────────────────────────────────

/// Body of `POST /log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRequest {
    /// The scheduler historically spells this `logDateTim`.
    #[serde(default, alias = "logDateTim")]
    pub log_date_time: i64,
    #[serde(default)]
    pub log_id: i64,
    #[serde(default)]
    pub from_line_num: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogContent {
    pub from_line_num: i64,
    pub to_line_num: i64,
    pub log_content: String,
    pub is_end: bool,
}

/// Response of `POST /log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    pub content: LogContent,
}

// ── Outbound ──────────────────────────────────────────────────

/// Liveness announcement posted to `/api/registry` and `/api/registryRemove`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryRecord {
    pub registry_group: String,
    pub registry_key: String,
    pub registry_value: String,
}

impl RegistryRecord {
    pub fn executor(key: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            registry_group: REGISTRY_GROUP.to_string(),
            registry_key: key.into(),
            registry_value: address.into(),
        }
    }
}

/// Terminal outcome of one task, posted to `/api/callback`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackRecord {
    pub job_id: i64,
    pub log_id: i64,
    pub log_date_time: i64,
    pub code: i64,
    pub msg: String,
}

impl CallbackRecord {
    pub fn for_request(request: &RunRequest, code: i64, msg: impl Into<String>) -> Self {
        Self {
            job_id: request.job_id,
            log_id: request.log_id,
            log_date_time: request.log_date_time,
            code,
            msg: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reports_malformed_body() {
        let err = decode::<KillRequest>(b"{\"jobId\":").unwrap_err();
        assert!(matches!(err, JobwireError::Decode(_)));
        assert_eq!(decode::<KillRequest>(br#"{"jobId":4}"#).unwrap().job_id, 4);
    }

    #[test]
    fn run_request_from_scheduler_json() {
        let body = r#"{
            "jobId": 7,
            "executorHandler": "demoJob",
            "executorParams": "a=1",
            "executorBlockStrategy": "COVER_EARLY",
            "executorTimeout": 30,
            "logId": 99,
            "logDateTime": 1700000000000,
            "glueType": "BEAN",
            "broadcastIndex": 0,
            "broadcastTotal": 1
        }"#;
        let req: RunRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.job_id, 7);
        assert_eq!(req.executor_handler, "demoJob");
        assert_eq!(req.executor_block_strategy, BlockStrategy::CoverEarly);
        assert_eq!(req.executor_timeout, 30);
        assert_eq!(req.log_id, 99);
        assert_eq!(req.glue_type.as_deref(), Some("BEAN"));
    }

    #[test]
    fn block_strategy_defaults_to_discard() {
        let req: RunRequest =
            serde_json::from_str(r#"{"jobId":1,"executorHandler":"x"}"#).unwrap();
        assert_eq!(req.executor_block_strategy, BlockStrategy::Discard);

        for raw in ["SERIAL_EXECUTION", "DISCARD_LATER", "whatever"] {
            assert_eq!(BlockStrategy::from_wire(raw), BlockStrategy::Discard);
        }

        let req: RunRequest = serde_json::from_str(
            r#"{"jobId":1,"executorHandler":"x","executorBlockStrategy":null}"#,
        )
        .unwrap();
        assert_eq!(req.executor_block_strategy, BlockStrategy::Discard);
    }

    #[test]
    fn run_request_requires_job_id() {
        assert!(serde_json::from_str::<RunRequest>(r#"{"executorHandler":"x"}"#).is_err());
    }

    #[test]
    fn log_request_accepts_legacy_field_name() {
        let req: LogRequest =
            serde_json::from_str(r#"{"logDateTim":123,"logId":4,"fromLineNum":1}"#).unwrap();
        assert_eq!(req.log_date_time, 123);
        assert_eq!(req.log_id, 4);
    }

    #[test]
    fn registry_record_wire_shape() {
        let record = RegistryRecord::executor("demo-app", "http://10.0.0.1:9999");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["registryGroup"], "EXECUTOR");
        assert_eq!(json["registryKey"], "demo-app");
        assert_eq!(json["registryValue"], "http://10.0.0.1:9999");
    }

    #[test]
    fn callback_echoes_log_identity() {
        let mut req = RunRequest::new(3, "demoJob");
        req.log_id = 11;
        req.log_date_time = 22;
        let cb = CallbackRecord::for_request(&req, FAILURE_CODE, "boom");
        let json = serde_json::to_value(&cb).unwrap();
        assert_eq!(json["jobId"], 3);
        assert_eq!(json["logId"], 11);
        assert_eq!(json["logDateTime"], 22);
        assert_eq!(json["code"], 500);
        assert_eq!(json["msg"], "boom");
    }

    #[test]
    fn return_t_codes() {
        let ok = serde_json::to_value(ReturnT::success()).unwrap();
        assert_eq!(ok["code"], 200);
        assert!(ok["msg"].is_null());
        assert!(!ReturnT::failure("x").is_success());
    }
}
