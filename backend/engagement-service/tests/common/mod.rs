//! Shared fixtures for integration tests: in-memory collaborator fakes
//! and a fully wired engagement pipeline.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use engagement_service::clients::{
    CreatorDirectory, InterestSource, LikeStore, LikeToggle, ModerationFlags, VideoDirectory,
};
use engagement_service::config::SessionConfig;
use engagement_service::error::Result;
use engagement_service::models::{CreatorProfile, ProcessingStatus};
use engagement_service::services::stats_store::NewVideo;
use engagement_service::{
    EventIngest, FeedAssembler, RankingIndex, ScoringPolicy, SessionRegistry, StatsStore,
};

/// Every video is completed and visible.
pub struct OpenDirectory;

#[async_trait]
impl VideoDirectory for OpenDirectory {
    async fn processing_status(&self, _video_id: Uuid) -> Result<ProcessingStatus> {
        Ok(ProcessingStatus::Completed)
    }

    async fn is_visible(&self, _video_id: Uuid, _viewer: Uuid) -> Result<bool> {
        Ok(true)
    }
}

pub struct ApproveAll;

#[async_trait]
impl ModerationFlags for ApproveAll {
    async fn is_approved(&self, _video_id: Uuid) -> Result<bool> {
        Ok(true)
    }
}

/// Real toggle semantics over an in-memory like relation.
pub struct InMemoryLikes {
    liked: Mutex<HashSet<(Uuid, Uuid)>>,
}

impl InMemoryLikes {
    pub fn new() -> Self {
        Self {
            liked: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl LikeStore for InMemoryLikes {
    async fn toggle_like(&self, user_id: Uuid, video_id: Uuid) -> Result<LikeToggle> {
        let mut liked = self.liked.lock().unwrap();
        let key = (user_id, video_id);
        let was_net_new = liked.insert(key);
        if !was_net_new {
            liked.remove(&key);
        }
        Ok(LikeToggle { was_net_new })
    }
}

pub struct FixedInterests(pub Vec<String>);

#[async_trait]
impl InterestSource for FixedInterests {
    async fn interests_of(&self, _user_id: Uuid) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

pub struct StubCreators;

#[async_trait]
impl CreatorDirectory for StubCreators {
    async fn profile_of(&self, creator_id: Uuid) -> Result<CreatorProfile> {
        Ok(CreatorProfile {
            user_id: creator_id,
            username: "creator".to_string(),
            display_name: Some("Creator".to_string()),
            avatar_url: None,
            is_verified: true,
        })
    }

    async fn is_following(&self, _follower: Uuid, _creator: Uuid) -> Result<bool> {
        Ok(false)
    }
}

/// Fully wired pipeline over fake collaborators.
pub struct TestPipeline {
    pub stats: Arc<StatsStore>,
    pub index: Arc<RankingIndex>,
    pub ingest: Arc<EventIngest>,
    pub assembler: Arc<FeedAssembler>,
    pub registry: Arc<SessionRegistry>,
    pub directory: Arc<dyn VideoDirectory>,
    pub likes: Arc<InMemoryLikes>,
    pub interests: Arc<FixedInterests>,
}

pub fn pipeline(interests: &[&str], page_size: usize) -> TestPipeline {
    let stats = Arc::new(StatsStore::new());
    let policy = ScoringPolicy::new();
    let index = Arc::new(RankingIndex::new(policy.clone()));
    let directory: Arc<dyn VideoDirectory> = Arc::new(OpenDirectory);
    let likes = Arc::new(InMemoryLikes::new());
    let interests = Arc::new(FixedInterests(
        interests.iter().map(|s| s.to_string()).collect(),
    ));

    let ingest = Arc::new(EventIngest::new(stats.clone(), directory.clone()));
    let assembler = Arc::new(FeedAssembler::new(
        index.clone(),
        Arc::new(ApproveAll),
        directory.clone(),
    ));
    let registry = Arc::new(SessionRegistry::new(
        assembler.clone(),
        ingest.clone(),
        stats.clone(),
        policy,
        likes.clone(),
        interests.clone(),
        Arc::new(StubCreators),
        directory.clone(),
        SessionConfig {
            grace_period_secs: 300,
            exclude_capacity: 500,
            min_view_seconds: 3.0,
            page_size,
        },
    ));

    TestPipeline {
        stats,
        index,
        ingest,
        assembler,
        registry,
        directory,
        likes,
        interests,
    }
}

/// Register a completed video directly against the stats store.
pub fn seed_video(pipeline: &TestPipeline, creator_id: Uuid, category: &str) -> Uuid {
    let video_id = Uuid::new_v4();
    pipeline.stats.create(NewVideo {
        video_id,
        creator_id,
        category: category.to_string(),
        hashtags: vec![],
        duration_seconds: 30.0,
        published_at: Utc::now(),
    });
    video_id
}
