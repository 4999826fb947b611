//! Registry heartbeat: keeps this executor discoverable by the scheduler.
//!
//! The first registration goes out immediately, then one every interval no
//! matter how the previous attempt went. Failures are logged and left to the
//! next tick. On shutdown a single de-registration is attempted.

use std::sync::Arc;
use std::time::Duration;

use jobwire_core::RegistryRecord;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::client::SchedulerApi;

pub struct Heartbeat {
    scheduler: Arc<dyn SchedulerApi>,
    registry_key: String,
    address: String,
    interval: Duration,
}

impl Heartbeat {
    pub fn new(
        scheduler: Arc<dyn SchedulerApi>,
        registry_key: impl Into<String>,
        address: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            scheduler,
            registry_key: registry_key.into(),
            address: address.into(),
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn record(&self) -> RegistryRecord {
        RegistryRecord::executor(&self.registry_key, &self.address)
    }

    /// One registration attempt. Returns whether the scheduler accepted it.
    pub async fn beat_once(&self) -> bool {
        match self.scheduler.registry(&self.record()).await {
            Ok(resp) if resp.is_success() => {
                info!(
                    key = %self.registry_key,
                    address = %self.address,
                    "Executor registry success"
                );
                true
            }
            Ok(resp) => {
                error!(code = resp.code, msg = ?resp.msg, "Executor registry rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, "Executor registry failed");
                false
            }
        }
    }

    /// Tick until `shutdown` fires. Does not de-register.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.beat_once().await;
                }
            }
        }
        info!("Heartbeat loop stopped");
    }

    /// Best-effort removal from the registry; the result is only logged.
    pub async fn deregister(&self) -> bool {
        match self.scheduler.registry_remove(&self.record()).await {
            Ok(resp) => {
                info!(code = resp.code, msg = ?resp.msg, "Executor registry remove finished");
                resp.is_success()
            }
            Err(e) => {
                warn!(error = %e, "Executor registry remove failed");
                false
            }
        }
    }
}
