//! Pending-view watchdog.
//!
//! Clients that disappear mid-playback never send the terminating view;
//! this job finalizes their views with last-known progress instead of
//! leaving them pending indefinitely.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::services::ingest::EventIngest;

#[derive(Debug, Clone)]
pub struct ViewFinalizerConfig {
    pub sweep_interval: Duration,
    pub finalize_after: Duration,
}

impl Default for ViewFinalizerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(10),
            finalize_after: Duration::from_secs(60),
        }
    }
}

pub async fn start_view_finalizer(ingest: Arc<EventIngest>, config: ViewFinalizerConfig) {
    tracing::info!(
        sweep_interval_secs = config.sweep_interval.as_secs(),
        finalize_after_secs = config.finalize_after.as_secs(),
        "Starting view finalizer watchdog"
    );

    loop {
        sleep(config.sweep_interval).await;

        let finalized = ingest.finalize_stale(Utc::now(), config.finalize_after);
        if finalized > 0 {
            tracing::info!(finalized, "Finalized abandoned views with last-known progress");
        }
    }
}
