//! Drives one task instance from Running to a terminal outcome.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::task::{Task, TaskOutcome};

/// Run the bound work function to completion and classify how it ended.
///
/// A panic inside the work function is caught here and reported as
/// [`TaskOutcome::Failed`]. When the deadline passes, the task's token is
/// cancelled and the work function is still awaited; the framework never
/// aborts it.
pub async fn drive(task: &Task) -> TaskOutcome {
    let ctx = task.context();
    let handler = Arc::clone(task.handler());
    let token = task.token().clone();

    let work = AssertUnwindSafe(async move { handler.execute(ctx).await }).catch_unwind();
    tokio::pin!(work);

    let early = match task.deadline() {
        Some(deadline) => tokio::select! {
            biased;
            res = &mut work => Some(res),
            _ = tokio::time::sleep_until(deadline) => None,
        },
        None => Some((&mut work).await),
    };

    let mut timed_out = false;
    let result = match early {
        Some(res) => res,
        None => {
            // A kill that landed first keeps its Cancelled outcome.
            if !token.is_cancelled() {
                timed_out = true;
                token.cancel();
                tracing::warn!(
                    job_id = task.id,
                    handler = %task.name,
                    timeout_secs = task.timeout_secs(),
                    "Task deadline passed, cancelling"
                );
            }
            work.await
        }
    };

    match result {
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            tracing::error!(job_id = task.id, handler = %task.name, %reason, "Task panicked");
            TaskOutcome::Failed(format!("panic: {reason}"))
        }
        Ok(_) if timed_out => TaskOutcome::TimedOut {
            timeout_secs: task.timeout_secs(),
        },
        Ok(_) if token.is_cancelled() => TaskOutcome::Cancelled,
        Ok(Ok(msg)) => TaskOutcome::Completed(msg),
        Ok(Err(e)) => TaskOutcome::Failed(e.to_string()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
