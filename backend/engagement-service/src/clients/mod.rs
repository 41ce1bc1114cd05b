//! Collaborator clients.
//!
//! Everything this service does not own — video existence and visibility,
//! the like relation, user interests, moderation flags, creator profiles —
//! is consumed through these traits. The HTTP implementations talk to the
//! sibling services configured in `CollaboratorConfig`.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::CollaboratorConfig;
use crate::error::{AppError, Result};
use crate::models::{CreatorProfile, ProcessingStatus};

#[derive(Debug, Clone, Copy)]
pub struct LikeToggle {
    pub was_net_new: bool,
}

#[async_trait]
pub trait VideoDirectory: Send + Sync {
    async fn processing_status(&self, video_id: Uuid) -> Result<ProcessingStatus>;
    async fn is_visible(&self, video_id: Uuid, viewer: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait LikeStore: Send + Sync {
    /// Toggle the like relation; reports whether a net-new like was created.
    async fn toggle_like(&self, user_id: Uuid, video_id: Uuid) -> Result<LikeToggle>;
}

#[async_trait]
pub trait InterestSource: Send + Sync {
    /// Category tags the user has expressed interest in.
    async fn interests_of(&self, user_id: Uuid) -> Result<Vec<String>>;
}

#[async_trait]
pub trait ModerationFlags: Send + Sync {
    async fn is_approved(&self, video_id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait CreatorDirectory: Send + Sync {
    async fn profile_of(&self, creator_id: Uuid) -> Result<CreatorProfile>;
    async fn is_following(&self, follower: Uuid, creator: Uuid) -> Result<bool>;
}

/// Bundle of collaborator handles wired at startup.
#[derive(Clone)]
pub struct Collaborators {
    pub videos: Arc<dyn VideoDirectory>,
    pub likes: Arc<dyn LikeStore>,
    pub interests: Arc<dyn InterestSource>,
    pub moderation: Arc<dyn ModerationFlags>,
    pub creators: Arc<dyn CreatorDirectory>,
}

impl Collaborators {
    pub fn from_config(cfg: &CollaboratorConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        Ok(Self {
            videos: Arc::new(HttpVideoDirectory {
                http: http.clone(),
                base_url: cfg.content_service_url.clone(),
            }),
            likes: Arc::new(HttpLikeStore {
                http: http.clone(),
                base_url: cfg.social_service_url.clone(),
            }),
            interests: Arc::new(HttpInterestSource {
                http: http.clone(),
                base_url: cfg.identity_service_url.clone(),
            }),
            moderation: Arc::new(HttpModerationFlags {
                http: http.clone(),
                base_url: cfg.trust_safety_service_url.clone(),
            }),
            creators: Arc::new(HttpCreatorDirectory {
                http,
                identity_url: cfg.identity_service_url.clone(),
                graph_url: cfg.graph_service_url.clone(),
            }),
        })
    }
}

pub struct HttpVideoDirectory {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct StatusBody {
    status: ProcessingStatus,
}

#[derive(Deserialize)]
struct VisibilityBody {
    visible: bool,
}

#[async_trait]
impl VideoDirectory for HttpVideoDirectory {
    async fn processing_status(&self, video_id: Uuid) -> Result<ProcessingStatus> {
        let url = format!("{}/api/v1/videos/{}/status", self.base_url, video_id);
        let resp = self.http.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("video {} not found", video_id)));
        }
        let body: StatusBody = resp.error_for_status()?.json().await?;
        Ok(body.status)
    }

    async fn is_visible(&self, video_id: Uuid, viewer: Uuid) -> Result<bool> {
        let url = format!(
            "{}/api/v1/videos/{}/visibility?viewerId={}",
            self.base_url, video_id, viewer
        );
        let body: VisibilityBody = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.visible)
    }
}

pub struct HttpLikeStore {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LikeToggleBody {
    was_net_new: bool,
}

#[async_trait]
impl LikeStore for HttpLikeStore {
    async fn toggle_like(&self, user_id: Uuid, video_id: Uuid) -> Result<LikeToggle> {
        let url = format!("{}/api/v1/likes/toggle", self.base_url);
        let body: LikeToggleBody = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "userId": user_id, "videoId": video_id }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(LikeToggle {
            was_net_new: body.was_net_new,
        })
    }
}

pub struct HttpInterestSource {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct InterestsBody {
    interests: Vec<String>,
}

#[async_trait]
impl InterestSource for HttpInterestSource {
    async fn interests_of(&self, user_id: Uuid) -> Result<Vec<String>> {
        let url = format!("{}/api/v1/users/{}/interests", self.base_url, user_id);
        let body: InterestsBody = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.interests)
    }
}

pub struct HttpModerationFlags {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ApprovalBody {
    approved: bool,
}

#[async_trait]
impl ModerationFlags for HttpModerationFlags {
    async fn is_approved(&self, video_id: Uuid) -> Result<bool> {
        let url = format!("{}/api/v1/videos/{}/approval", self.base_url, video_id);
        let body: ApprovalBody = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.approved)
    }
}

pub struct HttpCreatorDirectory {
    http: reqwest::Client,
    identity_url: String,
    graph_url: String,
}

#[derive(Deserialize)]
struct FollowBody {
    following: bool,
}

#[async_trait]
impl CreatorDirectory for HttpCreatorDirectory {
    async fn profile_of(&self, creator_id: Uuid) -> Result<CreatorProfile> {
        let url = format!("{}/api/v1/users/{}/profile", self.identity_url, creator_id);
        let resp = self.http.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!(
                "creator {} not found",
                creator_id
            )));
        }
        let profile: CreatorProfile = resp.error_for_status()?.json().await?;
        Ok(profile)
    }

    async fn is_following(&self, follower: Uuid, creator: Uuid) -> Result<bool> {
        let url = format!(
            "{}/api/v1/follows/{}/{}",
            self.graph_url, follower, creator
        );
        let body: FollowBody = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.following)
    }
}
