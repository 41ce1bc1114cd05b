//! Trending and viral scoring.
//!
//! Pure functions of a stats snapshot and the caller's clock. The policy
//! never reads wall time itself, so historical snapshots can be re-scored
//! deterministically and two reads one second apart may legitimately
//! differ with no new events: decay is time-dependent by design.

use chrono::{DateTime, Utc};

use crate::models::{VideoScores, VideoStats};

/// Exponential decay time constant for the trending score. Half-life is
/// roughly 16.6 hours; newer content is favored aggressively.
const DECAY_TIME_CONSTANT_HOURS: f64 = 24.0;

/// Shares dominate virality; likes contribute a smaller cumulative signal.
const VIRAL_SHARE_WEIGHT: f64 = 10.0;
const VIRAL_LIKE_WEIGHT: f64 = 2.0;

/// Minimum viral score for a video to appear in the viral listing.
pub const VIRAL_LISTING_THRESHOLD: f64 = 100.0;

/// Relative counter weights in the trending score.
#[derive(Debug, Clone)]
pub struct TrendingWeights {
    pub views: f64,
    pub likes: f64,
    pub comments: f64,
    pub shares: f64,
}

impl Default for TrendingWeights {
    fn default() -> Self {
        Self {
            views: 0.4,
            likes: 0.3,
            comments: 0.2,
            shares: 0.1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScoringPolicy {
    weights: TrendingWeights,
}

impl ScoringPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: TrendingWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, stats: &VideoStats, now: DateTime<Utc>) -> VideoScores {
        VideoScores {
            trending: self.trending_score(stats, now),
            viral: self.viral_score(stats),
        }
    }

    /// Time-decayed weighted combination of the raw counters.
    pub fn trending_score(&self, stats: &VideoStats, now: DateTime<Utc>) -> f64 {
        let age_hours = ((now - stats.published_at).num_milliseconds() as f64 / 3_600_000.0)
            .max(0.0);
        let decay = (-age_hours / DECAY_TIME_CONSTANT_HOURS).exp();

        (self.weights.views * stats.views as f64
            + self.weights.likes * stats.likes as f64
            + self.weights.comments * stats.comments as f64
            + self.weights.shares * stats.shares as f64)
            * decay
    }

    /// Cumulative, non-decaying breakout signal. A video that suddenly
    /// collects shares stays flagged viral even after trending decays.
    pub fn viral_score(&self, stats: &VideoStats) -> f64 {
        VIRAL_SHARE_WEIGHT * stats.shares as f64 + VIRAL_LIKE_WEIGHT * stats.likes as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn stats(views: u64, likes: u64, comments: u64, shares: u64) -> VideoStats {
        let published_at = Utc::now();
        VideoStats {
            video_id: Uuid::new_v4(),
            creator_id: Uuid::new_v4(),
            category: "music".to_string(),
            hashtags: vec![],
            duration_seconds: 30.0,
            published_at,
            views,
            likes,
            comments,
            shares,
            saves: 0,
            average_watch_time_seconds: 0.0,
            completion_rate: 0.0,
            engagement_rate: 0.0,
            last_engagement_at: published_at,
            views_by_country: HashMap::new(),
            views_by_device: HashMap::new(),
            views_by_hour: HashMap::new(),
        }
    }

    #[test]
    fn test_trending_after_24_hours() {
        // 1000 views, 200 likes, 50 comments, 10 shares at t+24h:
        // (400 + 60 + 10 + 1) * exp(-1) ~= 173.2
        let policy = ScoringPolicy::new();
        let s = stats(1000, 200, 50, 10);
        let now = s.published_at + Duration::hours(24);

        let score = policy.trending_score(&s, now);
        assert!((score - 173.2).abs() < 0.5, "score was {}", score);
    }

    #[test]
    fn test_trending_fresh_has_no_decay() {
        let policy = ScoringPolicy::new();
        let s = stats(100, 10, 4, 2);
        let score = policy.trending_score(&s, s.published_at);
        assert!((score - (40.0 + 3.0 + 0.8 + 0.2)).abs() < 1e-9);
    }

    #[test]
    fn test_trending_strictly_decays() {
        let policy = ScoringPolicy::new();
        let s = stats(500, 50, 10, 5);

        let mut previous = f64::MAX;
        for hours in [0, 1, 6, 12, 24, 48, 96] {
            let score = policy.trending_score(&s, s.published_at + Duration::hours(hours));
            assert!(score < previous, "score did not decay at {}h", hours);
            previous = score;
        }
    }

    #[test]
    fn test_viral_is_time_invariant() {
        let policy = ScoringPolicy::new();
        let s = stats(1000, 20, 0, 7);

        let early = policy.score(&s, s.published_at).viral;
        let late = policy.score(&s, s.published_at + Duration::days(30)).viral;
        assert_eq!(early, late);
        assert_eq!(early, 7.0 * 10.0 + 20.0 * 2.0);
    }

    #[test]
    fn test_viral_threshold_scenario() {
        // 15 shares alone put a video over the listing threshold.
        let policy = ScoringPolicy::new();
        let s = stats(0, 0, 0, 15);
        let viral = policy.viral_score(&s);
        assert_eq!(viral, 150.0);
        assert!(viral >= VIRAL_LISTING_THRESHOLD);
    }
}
