//! Engagement event ingestion.
//!
//! Validates and normalizes incoming events, then forwards counter deltas
//! to the stats store. Rejections are explicit and never retried; the
//! like-dedupe decision arrives pre-computed from the like-relation store.

use chrono::{DateTime, Timelike, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clients::VideoDirectory;
use crate::error::AppError;
use crate::metrics;
use crate::models::{
    EngagementEvent, EngagementKind, ProcessingStatus, StatsDelta, VideoStats, ViewContext,
};
use crate::services::stats_store::StatsStore;

/// Why an engagement event was rejected. Rejections are terminal for the
/// event; the caller must not retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    UnknownVideo,
    VideoNotReady,
    NotVisible,
    InvalidWatchTime,
}

impl RejectReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::UnknownVideo => "unknown_video",
            Self::VideoNotReady => "video_not_ready",
            Self::NotVisible => "not_visible",
            Self::InvalidWatchTime => "invalid_watch_time",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<RejectReason> for AppError {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::UnknownVideo => {
                AppError::NotFound("video has no stats record".to_string())
            }
            RejectReason::VideoNotReady => {
                AppError::Validation("video processing is not completed".to_string())
            }
            RejectReason::NotVisible => {
                AppError::Validation("video is not visible to this user".to_string())
            }
            RejectReason::InvalidWatchTime => {
                AppError::Validation("watch time must be non-negative".to_string())
            }
        }
    }
}

/// Acknowledgement for an accepted event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestAck {
    pub video_id: Uuid,
    pub event: String,
    /// False for accepted no-ops: duplicate likes, progress-only views,
    /// swipe analytics.
    pub counted: bool,
}

/// A view whose terminating signal has not arrived yet.
#[derive(Debug, Clone)]
struct PendingView {
    watch_time_seconds: f64,
    context: ViewContext,
    occurred_at: DateTime<Utc>,
    last_update: DateTime<Utc>,
}

pub struct EventIngest {
    stats: Arc<StatsStore>,
    videos: Arc<dyn VideoDirectory>,
    pending_views: DashMap<(Uuid, Uuid), PendingView>,
}

impl EventIngest {
    pub fn new(stats: Arc<StatsStore>, videos: Arc<dyn VideoDirectory>) -> Self {
        Self {
            stats,
            videos,
            pending_views: DashMap::new(),
        }
    }

    /// Validate and apply one event. `visible` is the pre-computed access
    /// decision for (user, video); false fails closed regardless of how it
    /// was produced.
    pub async fn ingest(
        &self,
        event: EngagementEvent,
        visible: bool,
    ) -> Result<IngestAck, RejectReason> {
        let result = self.ingest_inner(event, visible).await;
        match &result {
            Ok(ack) => metrics::record_event(&ack.event),
            Err(reason) => metrics::record_reject(reason.as_str()),
        }
        result
    }

    async fn ingest_inner(
        &self,
        event: EngagementEvent,
        visible: bool,
    ) -> Result<IngestAck, RejectReason> {
        if !visible {
            return Err(RejectReason::NotVisible);
        }
        if let EngagementKind::View {
            watch_time_seconds, ..
        } = &event.kind
        {
            if *watch_time_seconds < 0.0 {
                return Err(RejectReason::InvalidWatchTime);
            }
        }
        if !self.stats.contains(event.video_id) {
            return Err(RejectReason::UnknownVideo);
        }

        // Fail closed on directory errors: an unverifiable video is not ready.
        let status = self
            .videos
            .processing_status(event.video_id)
            .await
            .unwrap_or_else(|e| {
                warn!(video_id = %event.video_id, error = %e, "Processing status lookup failed");
                ProcessingStatus::Processing
            });
        if status != ProcessingStatus::Completed {
            return Err(RejectReason::VideoNotReady);
        }

        let video_id = event.video_id;
        let occurred_at = event.occurred_at;
        let ack = |event: &str, counted: bool| IngestAck {
            video_id,
            event: event.to_string(),
            counted,
        };

        match event.kind {
            EngagementKind::View {
                watch_time_seconds,
                context,
                is_final,
            } => {
                if !is_final {
                    // Progress report; the watchdog finalizes it if the
                    // terminating view never arrives.
                    self.pending_views.insert(
                        (event.user_id, video_id),
                        PendingView {
                            watch_time_seconds,
                            context,
                            occurred_at,
                            last_update: Utc::now(),
                        },
                    );
                    return Ok(ack("view", false));
                }

                self.pending_views.remove(&(event.user_id, video_id));
                self.apply_view(video_id, watch_time_seconds, context, occurred_at)?;
                Ok(ack("view", true))
            }
            EngagementKind::Like { net_new } => {
                if !net_new {
                    // Duplicate like: acknowledged no-op.
                    debug!(video_id = %video_id, user_id = %event.user_id, "Duplicate like ignored");
                    return Ok(ack("like", false));
                }
                self.apply(video_id, StatsDelta::Like, occurred_at)?;
                Ok(ack("like", true))
            }
            EngagementKind::Unlike => {
                self.apply(video_id, StatsDelta::Unlike, occurred_at)?;
                Ok(ack("unlike", true))
            }
            EngagementKind::Comment => {
                self.apply(video_id, StatsDelta::Comment, occurred_at)?;
                Ok(ack("comment", true))
            }
            EngagementKind::Share => {
                self.apply(video_id, StatsDelta::Share, occurred_at)?;
                Ok(ack("share", true))
            }
            EngagementKind::Swipe { direction } => {
                // Analytics only; no counter moves.
                metrics::record_swipe(direction.as_str());
                Ok(ack("swipe", false))
            }
        }
    }

    /// Finalize pending views whose last progress report is older than
    /// `finalize_after`, using last-known progress. Returns how many were
    /// finalized.
    pub fn finalize_stale(&self, now: DateTime<Utc>, finalize_after: Duration) -> usize {
        let cutoff = now
            - chrono::Duration::from_std(finalize_after).unwrap_or_else(|_| chrono::Duration::zero());

        let stale: Vec<(Uuid, Uuid)> = self
            .pending_views
            .iter()
            .filter(|entry| entry.last_update < cutoff)
            .map(|entry| *entry.key())
            .collect();

        let mut finalized = 0;
        for key in stale {
            if let Some((_, pending)) = self.pending_views.remove(&key) {
                match self.apply_view(
                    key.1,
                    pending.watch_time_seconds,
                    pending.context,
                    pending.occurred_at,
                ) {
                    Ok(()) => finalized += 1,
                    // Video deleted while the view was pending; drop it.
                    Err(reason) => {
                        debug!(video_id = %key.1, reason = %reason, "Dropped stale pending view")
                    }
                }
            }
        }
        if finalized > 0 {
            metrics::record_views_finalized(finalized as u64);
        }
        finalized
    }

    pub fn pending_view_count(&self) -> usize {
        self.pending_views.len()
    }

    fn apply_view(
        &self,
        video_id: Uuid,
        watch_time_seconds: f64,
        context: ViewContext,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), RejectReason> {
        self.apply(
            video_id,
            StatsDelta::View {
                watch_time_seconds,
                context,
                hour_of_day: occurred_at.hour() as u8,
            },
            occurred_at,
        )
    }

    fn apply(
        &self,
        video_id: Uuid,
        delta: StatsDelta,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), RejectReason> {
        // A record can vanish between the existence check and the apply if
        // the video is deleted concurrently; surface it the same way.
        self.stats
            .apply(video_id, delta, occurred_at)
            .map(|_: VideoStats| ())
            .map_err(|_| RejectReason::UnknownVideo)
    }
}
