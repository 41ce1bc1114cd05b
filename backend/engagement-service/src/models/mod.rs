use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Lifecycle state reported by the video processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

impl SwipeDirection {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl std::fmt::Display for SwipeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Analytics dimensions attached to a view event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewContext {
    pub country: Option<String>,
    pub device: Option<String>,
}

/// Canonical engagement event, produced by validation in the ingest layer.
/// Transient: processed, never persisted.
#[derive(Debug, Clone)]
pub struct EngagementEvent {
    pub user_id: Uuid,
    pub video_id: Uuid,
    pub kind: EngagementKind,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum EngagementKind {
    View {
        watch_time_seconds: f64,
        context: ViewContext,
        /// A non-final view is a progress report; the watchdog finalizes it
        /// if the client never sends the terminating view.
        is_final: bool,
    },
    Like {
        /// Whether the like-relation store reported this as a net-new like.
        /// The at-most-one-like-per-user invariant is enforced there, not here.
        net_new: bool,
    },
    Unlike,
    Comment,
    Share,
    Swipe {
        direction: SwipeDirection,
    },
}

impl EngagementKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::View { .. } => "view",
            Self::Like { .. } => "like",
            Self::Unlike => "unlike",
            Self::Comment => "comment",
            Self::Share => "share",
            Self::Swipe { .. } => "swipe",
        }
    }
}

/// Per-video statistics record. Owned exclusively by `StatsStore`; every
/// read outside the store sees an owned snapshot, never a live handle.
///
/// Trending and viral scores are deliberately absent: they are pure
/// functions of the counters and the clock (see `ScoringPolicy`) and are
/// computed at materialization time, never stored as source of truth.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStats {
    pub video_id: Uuid,
    pub creator_id: Uuid,
    pub category: String,
    pub hashtags: Vec<String>,
    pub duration_seconds: f64,
    /// Publish time (processing completion). Immutable; drives score decay.
    pub published_at: DateTime<Utc>,

    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub saves: u64,

    pub average_watch_time_seconds: f64,
    /// Rolling average of per-view completion samples, 0-100.
    pub completion_rate: f64,
    /// 100 * (likes + comments + shares) / max(views, 1).
    pub engagement_rate: f64,

    pub last_engagement_at: DateTime<Utc>,

    pub views_by_country: HashMap<String, u64>,
    pub views_by_device: HashMap<String, u64>,
    pub views_by_hour: HashMap<u8, u64>,
}

/// Mutation applied to a video's counters by `StatsStore::apply`.
#[derive(Debug, Clone)]
pub enum StatsDelta {
    View {
        watch_time_seconds: f64,
        context: ViewContext,
        hour_of_day: u8,
    },
    Like,
    Unlike,
    Comment,
    Share,
}

/// Scores derived from a stats snapshot at a given instant.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoScores {
    pub trending: f64,
    pub viral: f64,
}

/// Ranking entry frozen inside a materialization epoch. Doubles as the
/// wire representation for feed and listing items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedVideo {
    pub video_id: Uuid,
    pub creator_id: Uuid,
    pub category: String,
    pub hashtags: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub trending_score: f64,
    pub viral_score: f64,
}

/// Personalized feed page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub videos: Vec<RankedVideo>,
    pub has_more: bool,
    pub limit: usize,
    pub skip: usize,
}

/// Page of a ranking listing (trending/viral/category/hashtag).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    pub items: Vec<RankedVideo>,
    pub has_more: bool,
    pub limit: usize,
    pub skip: usize,
    /// When the materialization serving this page was last refreshed.
    /// Pages within one refresh interval are internally consistent; pages
    /// across intervals may shift slightly. That is the documented
    /// staleness contract, not a defect.
    pub refreshed_at: DateTime<Utc>,
}

/// Creator profile as reported by the identity collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorProfile {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
}

/// Payload returned by a down-swipe: the creator behind the current video.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelView {
    pub creator: CreatorProfile,
    pub videos: Vec<RankedVideo>,
    pub is_following: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_status_str() {
        assert_eq!(ProcessingStatus::Completed.as_str(), "completed");
        assert_eq!(ProcessingStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_swipe_direction_str() {
        assert_eq!(SwipeDirection::Left.as_str(), "left");
        assert_eq!(SwipeDirection::Right.as_str(), "right");
        assert_eq!(SwipeDirection::Up.as_str(), "up");
        assert_eq!(SwipeDirection::Down.as_str(), "down");
    }

    #[test]
    fn test_engagement_kind_str() {
        assert_eq!(
            EngagementKind::View {
                watch_time_seconds: 1.0,
                context: ViewContext::default(),
                is_final: true
            }
            .as_str(),
            "view"
        );
        assert_eq!(EngagementKind::Like { net_new: true }.as_str(), "like");
        assert_eq!(EngagementKind::Unlike.as_str(), "unlike");
        assert_eq!(
            EngagementKind::Swipe {
                direction: SwipeDirection::Down
            }
            .as_str(),
            "swipe"
        );
    }
}
