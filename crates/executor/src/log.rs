//! Pluggable task-log lookup behind `POST /log`.

use async_trait::async_trait;
use jobwire_core::{LogContent, LogRequest, LogResponse, SUCCESS_CODE};

#[async_trait]
pub trait LogHandler: Send + Sync {
    async fn query(&self, request: &LogRequest) -> LogResponse;
}

/// Answer given when no [`LogHandler`] is installed.
pub fn unsupported(request: &LogRequest) -> LogResponse {
    LogResponse {
        code: SUCCESS_CODE,
        msg: None,
        content: LogContent {
            from_line_num: request.from_line_num,
            to_line_num: request.from_line_num,
            log_content: "This executor does not support log queries".to_string(),
            is_end: true,
        },
    }
}
