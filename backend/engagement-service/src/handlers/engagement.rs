/// Engagement event API handler
///
/// Validates the wire event, resolves the access decision, and forwards
/// the canonical event to the ingest pipeline.
use actix_web::{post, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clients::{LikeStore, VideoDirectory};
use crate::error::{AppError, Result};
use crate::models::{EngagementEvent, EngagementKind, SwipeDirection, ViewContext};
use crate::services::ingest::{EventIngest, RejectReason};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementEventRequest {
    pub user_id: Uuid,
    pub video_id: Uuid,
    /// "view", "like", "unlike", "comment", "share" or "swipe".
    pub event_type: String,
    pub watch_time_seconds: Option<f64>,
    pub swipe_direction: Option<String>,
    /// Client-reported; server-assigned when absent.
    pub occurred_at: Option<DateTime<Utc>>,
    /// For views: false marks a progress report, true (default) the
    /// terminating view.
    pub is_final: Option<bool>,
    pub country: Option<String>,
    pub device: Option<String>,
}

pub struct EngagementHandlerState {
    pub ingest: Arc<EventIngest>,
    pub videos: Arc<dyn VideoDirectory>,
    pub likes: Arc<dyn LikeStore>,
}

/// POST /api/v1/engagement/events
#[post("/api/v1/engagement/events")]
pub async fn record_event(
    body: web::Json<EngagementEventRequest>,
    state: web::Data<EngagementHandlerState>,
) -> Result<HttpResponse> {
    let body = body.into_inner();

    debug!(
        user_id = %body.user_id,
        video_id = %body.video_id,
        event_type = %body.event_type,
        "Engagement event received"
    );

    // Access control is delegated; an unreachable collaborator fails closed.
    let visible = state
        .videos
        .is_visible(body.video_id, body.user_id)
        .await
        .unwrap_or_else(|e| {
            warn!(video_id = %body.video_id, error = %e, "Visibility lookup failed, failing closed");
            false
        });

    let kind = match body.event_type.to_lowercase().as_str() {
        "view" => EngagementKind::View {
            watch_time_seconds: body.watch_time_seconds.unwrap_or(0.0),
            context: ViewContext {
                country: body.country,
                device: body.device,
            },
            is_final: body.is_final.unwrap_or(true),
        },
        "like" => {
            if !visible {
                // Reject before touching the like relation.
                crate::metrics::record_reject(RejectReason::NotVisible.as_str());
                return Err(RejectReason::NotVisible.into());
            }
            let toggle = state.likes.toggle_like(body.user_id, body.video_id).await?;
            EngagementKind::Like {
                net_new: toggle.was_net_new,
            }
        }
        "unlike" => EngagementKind::Unlike,
        "comment" => EngagementKind::Comment,
        "share" => EngagementKind::Share,
        "swipe" => EngagementKind::Swipe {
            direction: parse_swipe_direction(body.swipe_direction.as_deref())?,
        },
        other => {
            return Err(AppError::BadRequest(format!(
                "Invalid eventType: {}. Must be one of: view, like, unlike, comment, share, swipe",
                other
            )))
        }
    };

    let event = EngagementEvent {
        user_id: body.user_id,
        video_id: body.video_id,
        kind,
        occurred_at: body.occurred_at.unwrap_or_else(Utc::now),
    };

    match state.ingest.ingest(event, visible).await {
        Ok(ack) => Ok(HttpResponse::Ok().json(ack)),
        Err(reason) => Err(reason.into()),
    }
}

pub(crate) fn parse_swipe_direction(s: Option<&str>) -> Result<SwipeDirection> {
    match s.map(|s| s.to_lowercase()).as_deref() {
        Some("left") => Ok(SwipeDirection::Left),
        Some("right") => Ok(SwipeDirection::Right),
        Some("up") => Ok(SwipeDirection::Up),
        Some("down") => Ok(SwipeDirection::Down),
        Some(other) => Err(AppError::BadRequest(format!(
            "Invalid swipeDirection: {}. Must be one of: left, right, up, down",
            other
        ))),
        None => Err(AppError::BadRequest(
            "swipeDirection is required for swipe events".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_swipe_direction() {
        assert!(parse_swipe_direction(Some("left")).is_ok());
        assert!(parse_swipe_direction(Some("RIGHT")).is_ok());
        assert!(parse_swipe_direction(Some("up")).is_ok());
        assert!(parse_swipe_direction(Some("down")).is_ok());
        assert!(parse_swipe_direction(Some("sideways")).is_err());
        assert!(parse_swipe_direction(None).is_err());
    }
}
