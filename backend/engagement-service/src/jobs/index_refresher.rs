//! Ranking index refresh job.
//!
//! Decouples score recomputation from the write path: the materialization
//! is rebuilt on a fixed cadence (the staleness bound) instead of on every
//! counter save. A failed sweep keeps the last-good materialization
//! serving and retries on the next tick; feed reads never block on it.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::metrics;
use crate::services::ranking_index::RankingIndex;
use crate::services::stats_store::StatsStore;

#[derive(Debug, Clone)]
pub struct IndexRefresherConfig {
    pub interval: Duration,
}

impl Default for IndexRefresherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

pub async fn start_index_refresher(
    stats: Arc<StatsStore>,
    index: Arc<RankingIndex>,
    config: IndexRefresherConfig,
) {
    tracing::info!(
        interval_secs = config.interval.as_secs(),
        "Starting ranking index refresher"
    );

    loop {
        sleep(config.interval).await;

        match index.refresh(&stats, Utc::now()) {
            Ok(summary) => {
                metrics::record_index_refresh(summary.entries, summary.duration);
                tracing::debug!(
                    epoch = summary.epoch,
                    entries = summary.entries,
                    duration_us = summary.duration.as_micros() as u64,
                    "Ranking index refreshed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Ranking index refresh failed, serving last-good materialization"
                );
            }
        }
    }
}
