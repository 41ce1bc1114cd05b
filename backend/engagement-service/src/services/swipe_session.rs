//! Swipe session control.
//!
//! One session owns one user's linear traversal through a materialized
//! video sequence. Session state is exclusive to its connection; swipes
//! for the same session serialize in arrival order behind an async mutex,
//! and an optional client sequence number rejects out-of-order duplicates.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clients::{CreatorDirectory, InterestSource, LikeStore, VideoDirectory};
use crate::config::SessionConfig;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{
    ChannelView, EngagementEvent, EngagementKind, RankedVideo, SwipeDirection, ViewContext,
};
use crate::services::feed::FeedAssembler;
use crate::services::ingest::EventIngest;
use crate::services::scoring::ScoringPolicy;
use crate::services::stats_store::StatsStore;

/// How many of a creator's videos a down-swipe returns.
const CHANNEL_VIDEO_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Browsing,
    Liking,
    Advancing,
    Retreating,
    ViewingChannel,
}

/// Per-session feed cursor plus the bounded seen-recently set.
pub struct SwipeSession {
    pub session_id: Uuid,
    pub user_id: Uuid,
    state: SessionState,
    interests: Vec<String>,
    queue: Vec<RankedVideo>,
    /// Always within [0, queue.len()]; == len means the cursor has run
    /// past the last materialized video.
    position: usize,
    exclude_order: VecDeque<Uuid>,
    exclude_lookup: HashSet<Uuid>,
    last_sequence: Option<u64>,
    pub last_active: DateTime<Utc>,
}

impl SwipeSession {
    fn new(session_id: Uuid, user_id: Uuid, interests: Vec<String>, queue: Vec<RankedVideo>) -> Self {
        Self {
            session_id,
            user_id,
            state: SessionState::Browsing,
            interests,
            queue,
            position: 0,
            exclude_order: VecDeque::new(),
            exclude_lookup: HashSet::new(),
            last_sequence: None,
            last_active: Utc::now(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn current(&self) -> Option<&RankedVideo> {
        self.queue.get(self.position)
    }

    pub fn exclude_set(&self) -> HashSet<Uuid> {
        self.exclude_lookup.clone()
    }

    /// FIFO-bounded: the oldest exclusion falls out once the cap is hit,
    /// trading perfect suppression for bounded memory on long sessions.
    fn push_exclude(&mut self, video_id: Uuid, capacity: usize) {
        if !self.exclude_lookup.insert(video_id) {
            return;
        }
        self.exclude_order.push_back(video_id);
        while self.exclude_order.len() > capacity {
            if let Some(evicted) = self.exclude_order.pop_front() {
                self.exclude_lookup.remove(&evicted);
            }
        }
    }

    fn check_sequence(&mut self, sequence: Option<u64>) -> Result<()> {
        if let Some(seq) = sequence {
            if let Some(last) = self.last_sequence {
                if seq <= last {
                    return Err(AppError::Conflict(format!(
                        "stale swipe sequence {} (last applied {})",
                        seq, last
                    )));
                }
            }
            self.last_sequence = Some(seq);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SwipeCommand {
    pub direction: SwipeDirection,
    pub watch_time_seconds: Option<f64>,
    pub sequence: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SwipeOutcome {
    /// Right swipe: like state after the toggle.
    Liked { video_id: Uuid, liked: bool },
    /// Left swipe: the cursor advanced.
    Advanced {
        video: Option<RankedVideo>,
        position: usize,
        fetched_more: bool,
    },
    /// Up swipe: the cursor moved back.
    Retreated {
        video: Option<RankedVideo>,
        position: usize,
    },
    /// Down swipe: creator channel payload; the cursor did not move.
    Channel { channel: ChannelView },
    /// Boundary swipe with nothing to do. Not an error.
    NoOp { position: usize },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    pub session_id: Uuid,
    pub videos: Vec<RankedVideo>,
    pub position: usize,
}

pub struct SessionRegistry {
    sessions: DashMap<Uuid, Arc<Mutex<SwipeSession>>>,
    assembler: Arc<FeedAssembler>,
    ingest: Arc<EventIngest>,
    stats: Arc<StatsStore>,
    policy: ScoringPolicy,
    likes: Arc<dyn LikeStore>,
    interests: Arc<dyn InterestSource>,
    creators: Arc<dyn CreatorDirectory>,
    videos: Arc<dyn VideoDirectory>,
    config: SessionConfig,
}

impl SessionRegistry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        assembler: Arc<FeedAssembler>,
        ingest: Arc<EventIngest>,
        stats: Arc<StatsStore>,
        policy: ScoringPolicy,
        likes: Arc<dyn LikeStore>,
        interests: Arc<dyn InterestSource>,
        creators: Arc<dyn CreatorDirectory>,
        videos: Arc<dyn VideoDirectory>,
        config: SessionConfig,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            assembler,
            ingest,
            stats,
            policy,
            likes,
            interests,
            creators,
            videos,
            config,
        }
    }

    /// Open a session and materialize its first feed page.
    pub async fn start_session(&self, user_id: Uuid) -> Result<SessionStart> {
        let interests = match self.interests.interests_of(user_id).await {
            Ok(interests) => interests,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Interest lookup failed, serving global feed");
                Vec::new()
            }
        };

        let page = self
            .assembler
            .personalized_feed(
                user_id,
                &interests,
                self.config.page_size,
                0,
                &HashSet::new(),
            )
            .await?;

        let session_id = Uuid::new_v4();
        let session = SwipeSession::new(session_id, user_id, interests, page.videos.clone());
        self.sessions
            .insert(session_id, Arc::new(Mutex::new(session)));
        metrics::set_active_sessions(self.sessions.len() as i64);

        info!(
            session_id = %session_id,
            user_id = %user_id,
            videos = page.videos.len(),
            "Swipe session started"
        );

        Ok(SessionStart {
            session_id,
            videos: page.videos,
            position: 0,
        })
    }

    /// Apply one swipe. The session mutex is held for the whole operation,
    /// so concurrent swipes from the same client apply in arrival order.
    pub async fn swipe(&self, session_id: Uuid, command: SwipeCommand) -> Result<SwipeOutcome> {
        let handle = self
            .sessions
            .get(&session_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| AppError::NotFound(format!("session {} not found", session_id)))?;

        let mut session = handle.lock().await;
        session.last_active = Utc::now();
        session.check_sequence(command.sequence)?;
        metrics::record_swipe(command.direction.as_str());

        let outcome = match command.direction {
            SwipeDirection::Right => self.swipe_right(&mut session).await,
            SwipeDirection::Left => {
                self.swipe_left(&mut session, command.watch_time_seconds.unwrap_or(0.0))
                    .await
            }
            SwipeDirection::Up => Ok(self.swipe_up(&mut session)),
            SwipeDirection::Down => self.swipe_down(&mut session).await,
        };
        session.state = SessionState::Browsing;
        outcome
    }

    /// End a session explicitly, discarding its cursor.
    pub fn end_session(&self, session_id: Uuid) -> Result<()> {
        self.sessions
            .remove(&session_id)
            .ok_or_else(|| AppError::NotFound(format!("session {} not found", session_id)))?;
        metrics::set_active_sessions(self.sessions.len() as i64);
        Ok(())
    }

    /// Current exclude set for a session, for feed calls made outside the
    /// swipe path.
    pub async fn exclude_set_of(&self, session_id: Uuid) -> Option<HashSet<Uuid>> {
        let handle = self.sessions.get(&session_id).map(|entry| entry.clone())?;
        let session = handle.lock().await;
        Some(session.exclude_set())
    }

    /// Drop sessions idle past the grace period. Busy sessions are by
    /// definition not idle, so a held lock skips the entry.
    pub fn reap_idle(&self, now: DateTime<Utc>, grace: Duration) -> usize {
        let cutoff =
            now - chrono::Duration::from_std(grace).unwrap_or_else(|_| chrono::Duration::zero());

        let mut expired = Vec::new();
        for entry in self.sessions.iter() {
            if let Ok(session) = entry.value().try_lock() {
                if session.last_active < cutoff {
                    expired.push(*entry.key());
                }
            }
        }

        let mut reaped = 0;
        for session_id in expired {
            if self.sessions.remove(&session_id).is_some() {
                debug!(session_id = %session_id, "Reaped idle swipe session");
                reaped += 1;
            }
        }
        if reaped > 0 {
            metrics::set_active_sessions(self.sessions.len() as i64);
        }
        reaped
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Right: toggle like state for the current video. A second right
    /// swipe on an already-liked video unlikes it.
    async fn swipe_right(&self, session: &mut SwipeSession) -> Result<SwipeOutcome> {
        session.state = SessionState::Liking;
        let Some(video) = session.current() else {
            return Ok(SwipeOutcome::NoOp {
                position: session.position,
            });
        };
        let video_id = video.video_id;

        let toggle = self.likes.toggle_like(session.user_id, video_id).await?;
        let kind = if toggle.was_net_new {
            EngagementKind::Like { net_new: true }
        } else {
            EngagementKind::Unlike
        };
        // The video was served through this session's feed, so the access
        // decision is already made.
        self.ingest
            .ingest(
                EngagementEvent {
                    user_id: session.user_id,
                    video_id,
                    kind,
                    occurred_at: Utc::now(),
                },
                true,
            )
            .await?;

        Ok(SwipeOutcome::Liked {
            video_id,
            liked: toggle.was_net_new,
        })
    }

    /// Left: emit the view (if watched long enough), exclude the video,
    /// advance — fetching another page at the end of the queue.
    async fn swipe_left(
        &self,
        session: &mut SwipeSession,
        watch_time_seconds: f64,
    ) -> Result<SwipeOutcome> {
        session.state = SessionState::Advancing;

        if let Some(video) = session.current().cloned() {
            if watch_time_seconds >= self.config.min_view_seconds {
                let result = self
                    .ingest
                    .ingest(
                        EngagementEvent {
                            user_id: session.user_id,
                            video_id: video.video_id,
                            kind: EngagementKind::View {
                                watch_time_seconds,
                                context: ViewContext::default(),
                                is_final: true,
                            },
                            occurred_at: Utc::now(),
                        },
                        true,
                    )
                    .await;
                if let Err(reason) = result {
                    // The advance still happens; the view alone is lost.
                    warn!(video_id = %video.video_id, reason = %reason, "View rejected on left swipe");
                }
            }
            session.push_exclude(video.video_id, self.config.exclude_capacity);
        }

        let before = session.position;
        let next = if session.position < session.queue.len() {
            session.position + 1
        } else {
            session.position
        };

        let mut fetched_more = false;
        if next >= session.queue.len() {
            fetched_more = self.extend_queue(session).await?;
        }
        if next < session.queue.len() {
            session.position = next;
        }

        if session.position == before && !fetched_more {
            return Ok(SwipeOutcome::NoOp {
                position: session.position,
            });
        }
        Ok(SwipeOutcome::Advanced {
            video: session.current().cloned(),
            position: session.position,
            fetched_more,
        })
    }

    /// Up: retreat one position; a retreat below 0 is a no-op.
    fn swipe_up(&self, session: &mut SwipeSession) -> SwipeOutcome {
        session.state = SessionState::Retreating;
        if session.position == 0 {
            return SwipeOutcome::NoOp { position: 0 };
        }
        session.position -= 1;
        SwipeOutcome::Retreated {
            video: session.current().cloned(),
            position: session.position,
        }
    }

    /// Down: creator channel for the current video; the cursor stays put.
    async fn swipe_down(&self, session: &mut SwipeSession) -> Result<SwipeOutcome> {
        session.state = SessionState::ViewingChannel;
        let Some(video) = session.current() else {
            return Ok(SwipeOutcome::NoOp {
                position: session.position,
            });
        };
        let creator_id = video.creator_id;
        let current_video = video.video_id;
        let viewer = session.user_id;

        let creator = self.creators.profile_of(creator_id).await?;
        let is_following = self
            .creators
            .is_following(viewer, creator_id)
            .await
            .unwrap_or_else(|e| {
                warn!(creator_id = %creator_id, error = %e, "Follow lookup failed");
                false
            });

        // The creator's other completed videos, most viewed first. The
        // catalog only holds completed videos, so visibility is the only
        // remaining filter.
        let now = Utc::now();
        let mut channel_videos = Vec::new();
        for snapshot in self.stats.by_creator(creator_id, Some(current_video)) {
            if channel_videos.len() == CHANNEL_VIDEO_LIMIT {
                break;
            }
            let visible = self
                .videos
                .is_visible(snapshot.video_id, viewer)
                .await
                .unwrap_or(false);
            if !visible {
                continue;
            }
            let scores = self.policy.score(&snapshot, now);
            channel_videos.push(RankedVideo {
                video_id: snapshot.video_id,
                creator_id: snapshot.creator_id,
                category: snapshot.category.clone(),
                hashtags: snapshot.hashtags.clone(),
                published_at: snapshot.published_at,
                views: snapshot.views,
                likes: snapshot.likes,
                comments: snapshot.comments,
                shares: snapshot.shares,
                trending_score: scores.trending,
                viral_score: scores.viral,
            });
        }

        Ok(SwipeOutcome::Channel {
            channel: ChannelView {
                creator,
                videos: channel_videos,
                is_following,
            },
        })
    }

    /// Fetch the next feed page, excluding everything this session has
    /// already materialized or seen. Returns whether the queue grew.
    async fn extend_queue(&self, session: &mut SwipeSession) -> Result<bool> {
        let mut exclude = session.exclude_set();
        exclude.extend(session.queue.iter().map(|v| v.video_id));

        let page = self
            .assembler
            .personalized_feed(
                session.user_id,
                &session.interests,
                self.config.page_size,
                0,
                &exclude,
            )
            .await?;

        if page.videos.is_empty() {
            return Ok(false);
        }
        debug!(
            session_id = %session.session_id,
            fetched = page.videos.len(),
            "Extended session queue"
        );
        session.queue.extend(page.videos);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{LikeToggle, ModerationFlags};
    use crate::error::Result as AppResult;
    use crate::models::{CreatorProfile, ProcessingStatus, StatsDelta};
    use crate::services::ranking_index::RankingIndex;
    use crate::services::stats_store::NewVideo;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct OpenDirectory;

    #[async_trait]
    impl VideoDirectory for OpenDirectory {
        async fn processing_status(&self, _video_id: Uuid) -> AppResult<ProcessingStatus> {
            Ok(ProcessingStatus::Completed)
        }

        async fn is_visible(&self, _video_id: Uuid, _viewer: Uuid) -> AppResult<bool> {
            Ok(true)
        }
    }

    struct ApproveAll;

    #[async_trait]
    impl ModerationFlags for ApproveAll {
        async fn is_approved(&self, _video_id: Uuid) -> AppResult<bool> {
            Ok(true)
        }
    }

    /// Real toggle semantics over an in-memory relation set.
    struct InMemoryLikes {
        liked: StdMutex<HashSet<(Uuid, Uuid)>>,
    }

    impl InMemoryLikes {
        fn new() -> Self {
            Self {
                liked: StdMutex::new(HashSet::new()),
            }
        }
    }

    #[async_trait]
    impl LikeStore for InMemoryLikes {
        async fn toggle_like(&self, user_id: Uuid, video_id: Uuid) -> AppResult<LikeToggle> {
            let mut liked = self.liked.lock().unwrap();
            let key = (user_id, video_id);
            let was_net_new = liked.insert(key);
            if !was_net_new {
                liked.remove(&key);
            }
            Ok(LikeToggle { was_net_new })
        }
    }

    struct FixedInterests(Vec<String>);

    #[async_trait]
    impl InterestSource for FixedInterests {
        async fn interests_of(&self, _user_id: Uuid) -> AppResult<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    struct StubCreators {
        following: bool,
    }

    #[async_trait]
    impl CreatorDirectory for StubCreators {
        async fn profile_of(&self, creator_id: Uuid) -> AppResult<CreatorProfile> {
            Ok(CreatorProfile {
                user_id: creator_id,
                username: "creator".to_string(),
                display_name: None,
                avatar_url: None,
                is_verified: false,
            })
        }

        async fn is_following(&self, _follower: Uuid, _creator: Uuid) -> AppResult<bool> {
            Ok(self.following)
        }
    }

    struct Fixture {
        stats: Arc<StatsStore>,
        registry: SessionRegistry,
        creator: Uuid,
    }

    fn fixture(total_videos: usize, page_size: usize) -> Fixture {
        let stats = Arc::new(StatsStore::new());
        let index = Arc::new(RankingIndex::new(ScoringPolicy::new()));
        let creator = Uuid::new_v4();

        for i in 0..total_videos {
            let video_id = Uuid::new_v4();
            stats.create(NewVideo {
                video_id,
                creator_id: creator,
                category: "music".to_string(),
                hashtags: vec![],
                duration_seconds: 30.0,
                published_at: Utc::now(),
            });
            // Distinct like counts give a stable total order.
            for _ in 0..(total_videos - i) {
                stats.apply(video_id, StatsDelta::Like, Utc::now()).unwrap();
            }
        }
        index.refresh(&stats, Utc::now()).unwrap();

        let directory: Arc<dyn VideoDirectory> = Arc::new(OpenDirectory);
        let assembler = Arc::new(FeedAssembler::new(
            index.clone(),
            Arc::new(ApproveAll),
            directory.clone(),
        ));
        let ingest = Arc::new(EventIngest::new(stats.clone(), directory.clone()));
        let registry = SessionRegistry::new(
            assembler,
            ingest,
            stats.clone(),
            ScoringPolicy::new(),
            Arc::new(InMemoryLikes::new()),
            Arc::new(FixedInterests(vec!["music".to_string()])),
            Arc::new(StubCreators { following: true }),
            directory,
            SessionConfig {
                grace_period_secs: 300,
                exclude_capacity: 500,
                min_view_seconds: 3.0,
                page_size,
            },
        );

        Fixture {
            stats,
            registry,
            creator,
        }
    }

    fn swipe(direction: SwipeDirection) -> SwipeCommand {
        SwipeCommand {
            direction,
            watch_time_seconds: None,
            sequence: None,
        }
    }

    fn swipe_left_watched(watch: f64) -> SwipeCommand {
        SwipeCommand {
            direction: SwipeDirection::Left,
            watch_time_seconds: Some(watch),
            sequence: None,
        }
    }

    #[tokio::test]
    async fn test_right_swipe_toggle_is_an_involution() {
        let f = fixture(3, 10);
        let start = f.registry.start_session(Uuid::new_v4()).await.unwrap();
        let video_id = start.videos[0].video_id;

        let first = f
            .registry
            .swipe(start.session_id, swipe(SwipeDirection::Right))
            .await
            .unwrap();
        assert!(matches!(first, SwipeOutcome::Liked { liked: true, .. }));
        assert_eq!(f.stats.read(video_id).unwrap().likes, 4);

        let second = f
            .registry
            .swipe(start.session_id, swipe(SwipeDirection::Right))
            .await
            .unwrap();
        assert!(matches!(second, SwipeOutcome::Liked { liked: false, .. }));
        // toggle(toggle(s)) == s
        assert_eq!(f.stats.read(video_id).unwrap().likes, 3);
    }

    #[tokio::test]
    async fn test_left_swipe_emits_view_only_past_threshold() {
        let f = fixture(3, 10);
        let start = f.registry.start_session(Uuid::new_v4()).await.unwrap();
        let first = start.videos[0].video_id;
        let second = start.videos[1].video_id;

        f.registry
            .swipe(start.session_id, swipe_left_watched(1.5))
            .await
            .unwrap();
        assert_eq!(f.stats.read(first).unwrap().views, 0);

        f.registry
            .swipe(start.session_id, swipe_left_watched(7.0))
            .await
            .unwrap();
        let snap = f.stats.read(second).unwrap();
        assert_eq!(snap.views, 1);
        assert_eq!(snap.average_watch_time_seconds, 7.0);
    }

    #[tokio::test]
    async fn test_left_swipe_fetches_more_at_queue_end() {
        // 8 videos, pages of 5: position 4 of 5 is the last materialized
        // video, so the next advance must fetch before moving to 5.
        let f = fixture(8, 5);
        let start = f.registry.start_session(Uuid::new_v4()).await.unwrap();
        assert_eq!(start.videos.len(), 5);

        for _ in 0..4 {
            f.registry
                .swipe(start.session_id, swipe_left_watched(5.0))
                .await
                .unwrap();
        }
        let outcome = f
            .registry
            .swipe(start.session_id, swipe_left_watched(5.0))
            .await
            .unwrap();
        match outcome {
            SwipeOutcome::Advanced {
                position,
                fetched_more,
                video,
            } => {
                assert_eq!(position, 5);
                assert!(fetched_more);
                assert!(video.is_some());
            }
            other => panic!("expected Advanced, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_left_swipe_past_exhausted_feed_is_noop() {
        let f = fixture(2, 5);
        let start = f.registry.start_session(Uuid::new_v4()).await.unwrap();
        assert_eq!(start.videos.len(), 2);

        f.registry
            .swipe(start.session_id, swipe_left_watched(5.0))
            .await
            .unwrap();
        // Advance off the second (last) video: nothing left to fetch.
        let outcome = f
            .registry
            .swipe(start.session_id, swipe_left_watched(5.0))
            .await
            .unwrap();
        assert!(matches!(outcome, SwipeOutcome::NoOp { position: 1 }));
    }

    #[tokio::test]
    async fn test_up_swipe_at_zero_is_noop() {
        let f = fixture(3, 10);
        let start = f.registry.start_session(Uuid::new_v4()).await.unwrap();

        let outcome = f
            .registry
            .swipe(start.session_id, swipe(SwipeDirection::Up))
            .await
            .unwrap();
        assert!(matches!(outcome, SwipeOutcome::NoOp { position: 0 }));

        f.registry
            .swipe(start.session_id, swipe_left_watched(5.0))
            .await
            .unwrap();
        let outcome = f
            .registry
            .swipe(start.session_id, swipe(SwipeDirection::Up))
            .await
            .unwrap();
        assert!(matches!(outcome, SwipeOutcome::Retreated { position: 0, .. }));
    }

    #[tokio::test]
    async fn test_down_swipe_returns_channel_without_moving() {
        let f = fixture(4, 10);
        let start = f.registry.start_session(Uuid::new_v4()).await.unwrap();

        let outcome = f
            .registry
            .swipe(start.session_id, swipe(SwipeDirection::Down))
            .await
            .unwrap();
        match outcome {
            SwipeOutcome::Channel { channel } => {
                assert_eq!(channel.creator.user_id, f.creator);
                assert!(channel.is_following);
                // The other three creator videos, most viewed first.
                assert_eq!(channel.videos.len(), 3);
                assert!(channel.videos.windows(2).all(|w| w[0].views >= w[1].views));
            }
            other => panic!("expected Channel, got {:?}", other),
        }

        let next = f
            .registry
            .swipe(start.session_id, swipe(SwipeDirection::Up))
            .await
            .unwrap();
        // Still at position 0: down did not move the cursor.
        assert!(matches!(next, SwipeOutcome::NoOp { position: 0 }));
    }

    #[tokio::test]
    async fn test_stale_sequence_is_rejected() {
        let f = fixture(3, 10);
        let start = f.registry.start_session(Uuid::new_v4()).await.unwrap();

        let mut command = swipe_left_watched(5.0);
        command.sequence = Some(2);
        f.registry.swipe(start.session_id, command).await.unwrap();

        let mut replay = swipe_left_watched(5.0);
        replay.sequence = Some(2);
        let err = f.registry.swipe(start.session_id, replay).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let mut next = swipe_left_watched(5.0);
        next.sequence = Some(3);
        f.registry.swipe(start.session_id, next).await.unwrap();
    }

    #[test]
    fn test_sessions_settle_back_into_browsing() {
        let f = fixture(3, 10);
        let start = tokio_test::block_on(f.registry.start_session(Uuid::new_v4())).unwrap();
        tokio_test::block_on(f.registry.swipe(start.session_id, swipe(SwipeDirection::Right)))
            .unwrap();

        let handle = f
            .registry
            .sessions
            .get(&start.session_id)
            .map(|e| e.clone())
            .unwrap();
        let session = tokio_test::block_on(handle.lock());
        assert_eq!(session.state(), SessionState::Browsing);
    }

    #[test]
    fn test_exclude_set_is_fifo_bounded() {
        let mut session = SwipeSession::new(Uuid::new_v4(), Uuid::new_v4(), vec![], vec![]);
        let first = Uuid::new_v4();
        session.push_exclude(first, 3);
        let mut rest = Vec::new();
        for _ in 0..3 {
            let id = Uuid::new_v4();
            session.push_exclude(id, 3);
            rest.push(id);
        }

        let set = session.exclude_set();
        assert_eq!(set.len(), 3);
        assert!(!set.contains(&first));
        for id in rest {
            assert!(set.contains(&id));
        }
    }

    #[test]
    fn test_unknown_session_is_not_found() {
        let f = fixture(1, 5);
        let err = tokio_test::block_on(
            f.registry
                .swipe(Uuid::new_v4(), swipe(SwipeDirection::Left)),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reaper_drops_idle_sessions_after_grace() {
        let f = fixture(2, 5);
        let start = f.registry.start_session(Uuid::new_v4()).await.unwrap();
        assert_eq!(f.registry.active_sessions(), 1);

        // Within the grace period: retained for reconnection.
        let reaped = f
            .registry
            .reap_idle(Utc::now(), Duration::from_secs(300));
        assert_eq!(reaped, 0);

        let reaped = f.registry.reap_idle(
            Utc::now() + chrono::Duration::seconds(600),
            Duration::from_secs(300),
        );
        assert_eq!(reaped, 1);
        assert_eq!(f.registry.active_sessions(), 0);

        let err = f
            .registry
            .swipe(start.session_id, swipe(SwipeDirection::Left))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_position_invariant_holds_through_mixed_swipes() {
        let f = fixture(6, 3);
        let start = f.registry.start_session(Uuid::new_v4()).await.unwrap();

        for direction in [
            SwipeDirection::Up,
            SwipeDirection::Left,
            SwipeDirection::Right,
            SwipeDirection::Left,
            SwipeDirection::Down,
            SwipeDirection::Left,
            SwipeDirection::Left,
            SwipeDirection::Up,
            SwipeDirection::Left,
            SwipeDirection::Left,
            SwipeDirection::Left,
        ] {
            let mut command = swipe(direction);
            if direction == SwipeDirection::Left {
                command.watch_time_seconds = Some(5.0);
            }
            f.registry.swipe(start.session_id, command).await.unwrap();

            let handle = f
                .registry
                .sessions
                .get(&start.session_id)
                .map(|e| e.clone())
                .unwrap();
            let session = handle.lock().await;
            assert!(session.position() <= session.queue_len());
        }
    }
}
