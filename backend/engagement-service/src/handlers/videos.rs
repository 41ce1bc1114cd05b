/// Video lifecycle hooks
///
/// Called by the content pipeline: stats records are created when a
/// video's processing completes and destroyed when the video is deleted,
/// cascading into the ranking index.
use actix_web::{delete, patch, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::services::ranking_index::RankingIndex;
use crate::services::stats_store::{NewVideo, StatsStore};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterVideoRequest {
    pub video_id: Uuid,
    pub creator_id: Uuid,
    pub category: String,
    pub duration_seconds: f64,
    #[serde(default)]
    pub hashtags: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    pub category: String,
}

pub struct VideoHandlerState {
    pub stats: Arc<StatsStore>,
    pub index: Arc<RankingIndex>,
}

/// POST /api/v1/videos — publish hook (processing completed).
#[post("/api/v1/videos")]
pub async fn register_video(
    body: web::Json<RegisterVideoRequest>,
    state: web::Data<VideoHandlerState>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    if body.duration_seconds <= 0.0 {
        return Err(AppError::Validation(
            "durationSeconds must be positive".to_string(),
        ));
    }
    if body.category.trim().is_empty() {
        return Err(AppError::Validation("category is required".to_string()));
    }

    let stats = state.stats.create(NewVideo {
        video_id: body.video_id,
        creator_id: body.creator_id,
        category: body.category,
        hashtags: body.hashtags,
        duration_seconds: body.duration_seconds,
        published_at: body.published_at.unwrap_or_else(Utc::now),
    });

    info!(video_id = %stats.video_id, category = %stats.category, "Video registered");
    Ok(HttpResponse::Created().json(stats))
}

/// DELETE /api/v1/videos/{id} — delete hook; cascades into the index.
#[delete("/api/v1/videos/{id}")]
pub async fn delete_video(
    path: web::Path<Uuid>,
    state: web::Data<VideoHandlerState>,
) -> Result<HttpResponse> {
    let video_id = path.into_inner();

    state
        .stats
        .remove(video_id)
        .ok_or_else(|| AppError::NotFound(format!("video {} not found", video_id)))?;
    state.index.remove(video_id);

    info!(video_id = %video_id, "Video stats removed, ranking entries cleared");
    Ok(HttpResponse::NoContent().finish())
}

/// PATCH /api/v1/videos/{id}/category — reclassification hook.
#[patch("/api/v1/videos/{id}/category")]
pub async fn update_video_category(
    path: web::Path<Uuid>,
    body: web::Json<UpdateCategoryRequest>,
    state: web::Data<VideoHandlerState>,
) -> Result<HttpResponse> {
    let video_id = path.into_inner();
    if body.category.trim().is_empty() {
        return Err(AppError::Validation("category is required".to_string()));
    }

    let stats = state.stats.set_category(video_id, &body.category)?;
    state.index.upsert_category(video_id, &body.category);

    Ok(HttpResponse::Ok().json(stats))
}
