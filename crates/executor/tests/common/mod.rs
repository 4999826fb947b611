#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jobwire_core::{CallbackRecord, RegistryRecord, ReturnT};
use jobwire_executor::{
    build_router, handler_fn, Executor, JobHandler, SchedulerApi, SchedulerError,
};
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Scheduler center stand-in that keeps every callback it receives.
#[derive(Default)]
pub struct RecordingScheduler {
    pub callbacks: Mutex<Vec<CallbackRecord>>,
    pub registrations: Mutex<Vec<RegistryRecord>>,
    pub removals: Mutex<Vec<RegistryRecord>>,
}

impl RecordingScheduler {
    pub fn callbacks(&self) -> Vec<CallbackRecord> {
        self.callbacks.lock().unwrap().clone()
    }
}

#[async_trait]
impl SchedulerApi for RecordingScheduler {
    async fn registry(&self, record: &RegistryRecord) -> Result<ReturnT, SchedulerError> {
        self.registrations.lock().unwrap().push(record.clone());
        Ok(ReturnT::success())
    }

    async fn registry_remove(&self, record: &RegistryRecord) -> Result<ReturnT, SchedulerError> {
        self.removals.lock().unwrap().push(record.clone());
        Ok(ReturnT::success())
    }

    async fn callback(&self, record: &CallbackRecord) -> Result<ReturnT, SchedulerError> {
        self.callbacks.lock().unwrap().push(record.clone());
        Ok(ReturnT::success())
    }
}

pub fn executor_with(scheduler: Arc<dyn SchedulerApi>) -> Arc<Executor> {
    Executor::builder(scheduler, "it-exec", "http://127.0.0.1:9999").build()
}

/// Serve `executor` on an ephemeral port and return its base URL.
pub async fn serve(executor: Arc<Executor>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(executor)).await.unwrap();
    });
    format!("http://{addr}")
}

/// Work function that holds until `gate` is notified or the task is cancelled.
pub fn gated(gate: &Arc<Notify>) -> Arc<dyn JobHandler> {
    let gate = Arc::clone(gate);
    handler_fn(move |ctx| {
        let gate = Arc::clone(&gate);
        async move {
            tokio::select! {
                _ = gate.notified() => Ok(format!("{} done", ctx.trace_id)),
                _ = ctx.cancelled() => Ok("stopped".to_string()),
            }
        }
    })
}

pub async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

pub async fn post_json(base: &str, path: &str, body: serde_json::Value) -> serde_json::Value {
    reqwest::Client::new()
        .post(format!("{base}{path}"))
        .json(&body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}
