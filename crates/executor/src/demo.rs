//! Sample work functions registered by the binary unless `--no-demo` is given.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::executor::Executor;
use crate::task::{handler_fn, JobContext, JobError};

/// Sleeps for `executorParams` seconds (default 3), stopping early on cancel.
pub async fn demo_job(ctx: JobContext) -> Result<String, JobError> {
    let secs: u64 = ctx.params().trim().parse().unwrap_or(3);
    info!(trace_id = %ctx.trace_id, secs, "demoJob started");

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(secs)) => {
            info!(trace_id = %ctx.trace_id, "demoJob finished");
            Ok(format!("demoJob slept {secs}s"))
        }
        _ = ctx.cancelled() => {
            info!(trace_id = %ctx.trace_id, "demoJob cancelled");
            Ok("demoJob interrupted".to_string())
        }
    }
}

pub fn register_demo_jobs(executor: &Arc<Executor>) {
    executor.register("demoJob", handler_fn(demo_job));
    executor.register(
        "failJob",
        handler_fn(|ctx| async move {
            Err(JobError::failed(format!("failJob refused params '{}'", ctx.params())))
        }),
    );
    executor.register(
        "panicJob",
        handler_fn(|ctx| async move {
            if ctx.params() != "calm" {
                panic!("panicJob lost its temper");
            }
            Ok("panicJob stayed calm".to_string())
        }),
    );
}
