//! HTTP control surface the scheduler center calls.
//!
//! Every endpoint answers HTTP 200 with a JSON `{code, msg}` body; success and
//! failure travel in the domain code. Bodies are parsed by hand so a malformed
//! request still gets a structured failure instead of an extractor rejection.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use jobwire_core::{
    IdleBeatRequest, KillRequest, LogRequest, ReturnT, RunRequest, ACCESS_TOKEN_HEADER,
};
use serde::de::DeserializeOwned;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::ExecutorError;
use crate::executor::Executor;

/// Build the executor router with token check and request tracing.
pub fn build_router(executor: Arc<Executor>) -> Router {
    Router::new()
        .route("/run", post(run))
        .route("/kill", post(kill))
        .route("/log", post(log))
        .route("/beat", post(beat))
        .route("/ping", get(ping).post(ping))
        .route("/idleBeat", post(idle_beat))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&executor),
            require_token,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(executor)
}

async fn require_token(
    State(executor): State<Arc<Executor>>,
    request: Request,
    next: Next,
) -> Response {
    let expected = executor.access_token();
    if !expected.is_empty() {
        let provided = request
            .headers()
            .get(ACCESS_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            warn!(path = %request.uri().path(), "Rejected call with wrong access token");
            return Json(ExecutorError::Unauthorized.to_return()).into_response();
        }
    }
    next.run(request).await
}

fn parse<T: DeserializeOwned>(body: &Bytes) -> Result<T, ExecutorError> {
    jobwire_core::decode(body).map_err(|e| {
        error!(error = %e, "Malformed request body");
        ExecutorError::from(e)
    })
}

fn reply(result: Result<(), ExecutorError>) -> Json<ReturnT> {
    Json(match result {
        Ok(()) => ReturnT::success(),
        Err(e) => e.to_return(),
    })
}

async fn run(State(executor): State<Arc<Executor>>, body: Bytes) -> Json<ReturnT> {
    reply(parse::<RunRequest>(&body).and_then(|req| executor.run(req)))
}

async fn kill(State(executor): State<Arc<Executor>>, body: Bytes) -> Json<ReturnT> {
    reply(parse::<KillRequest>(&body).and_then(|req| executor.kill(req.job_id)))
}

async fn idle_beat(State(executor): State<Arc<Executor>>, body: Bytes) -> Json<ReturnT> {
    reply(parse::<IdleBeatRequest>(&body).and_then(|req| executor.idle_beat(req.job_id)))
}

async fn log(State(executor): State<Arc<Executor>>, body: Bytes) -> Response {
    match parse::<LogRequest>(&body) {
        Ok(req) => Json(executor.query_log(&req).await).into_response(),
        Err(e) => Json(e.to_return()).into_response(),
    }
}

async fn beat(State(executor): State<Arc<Executor>>) -> Json<ReturnT> {
    Json(executor.beat())
}

async fn ping(State(executor): State<Arc<Executor>>) -> Json<ReturnT> {
    Json(executor.ping())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockScheduler;
    use crate::client::SchedulerApi;
    use crate::task::handler_fn;
    use axum::body::Body;
    use axum::http::{header, Method, StatusCode};
    use http_body_util::BodyExt;
    use jobwire_core::{FAILURE_CODE, SUCCESS_CODE};
    use tower::ServiceExt;

    fn executor(token: &str) -> Arc<Executor> {
        let scheduler: Arc<dyn SchedulerApi> = Arc::new(MockScheduler::new());
        let executor = Executor::builder(scheduler, "demo-exec", "http://127.0.0.1:9999")
            .access_token(token)
            .build();
        executor.register(
            "demoJob",
            handler_fn(|ctx| async move {
                ctx.cancelled().await;
                Ok(String::new())
            }),
        );
        executor
    }

    async fn call(
        router: Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: &str,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(ACCESS_TOKEN_HEADER, token);
        }
        let response = router
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post(router: Router, uri: &str, body: &str) -> serde_json::Value {
        call(router, Method::POST, uri, None, body).await.1
    }

    #[tokio::test]
    async fn run_then_idle_beat_then_kill() {
        let executor = executor("");
        let router = build_router(Arc::clone(&executor));

        let run = post(
            router.clone(),
            "/run",
            r#"{"jobId":1,"executorHandler":"demoJob","executorParams":"","executorBlockStrategy":"SERIAL_EXECUTION","executorTimeout":0}"#,
        )
        .await;
        assert_eq!(run["code"], SUCCESS_CODE);
        assert!(executor.is_running(1));

        let busy = post(router.clone(), "/idleBeat", r#"{"jobId":1}"#).await;
        assert_eq!(busy["code"], FAILURE_CODE);
        let idle = post(router.clone(), "/idleBeat", r#"{"jobId":2}"#).await;
        assert_eq!(idle["code"], SUCCESS_CODE);

        let conflict = post(
            router.clone(),
            "/run",
            r#"{"jobId":1,"executorHandler":"demoJob"}"#,
        )
        .await;
        assert_eq!(conflict["code"], FAILURE_CODE);
        assert_eq!(conflict["msg"], "There are tasks running");

        let killed = post(router.clone(), "/kill", r#"{"jobId":1}"#).await;
        assert_eq!(killed["code"], SUCCESS_CODE);
        assert!(!executor.is_running(1));

        let again = post(router, "/kill", r#"{"jobId":1}"#).await;
        assert_eq!(again["code"], FAILURE_CODE);
    }

    #[tokio::test]
    async fn malformed_and_unregistered_runs_fail() {
        let executor = executor("");
        let router = build_router(Arc::clone(&executor));

        let (status, garbage) = call(router.clone(), Method::POST, "/run", None, "{not json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(garbage["code"], FAILURE_CODE);
        assert!(garbage["msg"].as_str().unwrap().starts_with("params err"));

        let missing = post(
            router,
            "/run",
            r#"{"jobId":3,"executorHandler":"nope"}"#,
        )
        .await;
        assert_eq!(missing["code"], FAILURE_CODE);
        assert_eq!(missing["msg"], "Task not registered");
        assert_eq!(executor.running_count(), 0);
    }

    #[tokio::test]
    async fn oversized_timeout_is_a_structured_failure() {
        let executor = executor("");
        let router = build_router(Arc::clone(&executor));

        let first = post(
            router.clone(),
            "/run",
            r#"{"jobId":2,"executorHandler":"demoJob"}"#,
        )
        .await;
        assert_eq!(first["code"], SUCCESS_CODE);

        let body = serde_json::json!({
            "jobId": 2,
            "executorHandler": "demoJob",
            "executorBlockStrategy": "COVER_EARLY",
            "executorTimeout": i64::MAX,
        })
        .to_string();
        let (status, rejected) = call(router, Method::POST, "/run", None, &body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rejected["code"], FAILURE_CODE);
        assert!(rejected["msg"].as_str().unwrap().starts_with("params err"));
        assert!(executor.is_running(2));
        executor.kill(2).unwrap();
    }

    #[tokio::test]
    async fn liveness_endpoints() {
        let router = build_router(executor(""));
        assert_eq!(post(router.clone(), "/beat", "").await["code"], SUCCESS_CODE);
        assert_eq!(post(router.clone(), "/ping", "").await["code"], SUCCESS_CODE);
        let (_, body) = call(router, Method::GET, "/ping", None, "").await;
        assert_eq!(body["code"], SUCCESS_CODE);
    }

    #[tokio::test]
    async fn log_without_handler_is_canned() {
        let router = build_router(executor(""));
        let body = post(
            router,
            "/log",
            r#"{"logDateTim":1700000000000,"logId":5,"fromLineNum":3}"#,
        )
        .await;
        assert_eq!(body["code"], SUCCESS_CODE);
        assert_eq!(body["content"]["fromLineNum"], 3);
        assert_eq!(body["content"]["toLineNum"], 3);
        assert_eq!(body["content"]["isEnd"], true);
    }

    #[tokio::test]
    async fn access_token_is_enforced() {
        let executor = executor("s3cret");
        let router = build_router(Arc::clone(&executor));
        let run = r#"{"jobId":4,"executorHandler":"demoJob"}"#;

        let (_, denied) = call(router.clone(), Method::POST, "/run", Some("wrong"), run).await;
        assert_eq!(denied["code"], FAILURE_CODE);
        assert_eq!(denied["msg"], "The access token is wrong.");
        assert!(!executor.is_running(4));

        let (_, missing) = call(router.clone(), Method::POST, "/beat", None, "").await;
        assert_eq!(missing["code"], FAILURE_CODE);

        let (_, allowed) = call(router, Method::POST, "/run", Some("s3cret"), run).await;
        assert_eq!(allowed["code"], SUCCESS_CODE);
        assert!(executor.is_running(4));
        executor.kill(4).unwrap();
    }
}
