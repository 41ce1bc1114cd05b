//! Swipe session reaper.
//!
//! A disconnected client keeps its feed cursor for a grace period so a
//! quick reconnect resumes instead of restarting; past the grace period
//! the cursor is discarded.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::services::swipe_session::SessionRegistry;

#[derive(Debug, Clone)]
pub struct SessionReaperConfig {
    pub sweep_interval: Duration,
    pub grace_period: Duration,
}

impl Default for SessionReaperConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
            grace_period: Duration::from_secs(300),
        }
    }
}

pub async fn start_session_reaper(registry: Arc<SessionRegistry>, config: SessionReaperConfig) {
    tracing::info!(
        sweep_interval_secs = config.sweep_interval.as_secs(),
        grace_period_secs = config.grace_period.as_secs(),
        "Starting session reaper"
    );

    loop {
        sleep(config.sweep_interval).await;

        let reaped = registry.reap_idle(Utc::now(), config.grace_period);
        if reaped > 0 {
            tracing::info!(
                reaped,
                active = registry.active_sessions(),
                "Discarded idle swipe sessions"
            );
        }
    }
}
