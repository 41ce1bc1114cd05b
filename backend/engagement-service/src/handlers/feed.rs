/// Personalized feed handler
use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clients::InterestSource;
use crate::error::Result;
use crate::models::FeedResponse;
use crate::services::feed::FeedAssembler;
use crate::services::swipe_session::SessionRegistry;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQueryParams {
    pub user_id: Uuid,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub skip: usize,
    /// Optional swipe session whose exclude set should be applied.
    pub session_id: Option<Uuid>,
}

fn default_limit() -> usize {
    20
}

pub struct FeedHandlerState {
    pub assembler: Arc<FeedAssembler>,
    pub interests: Arc<dyn InterestSource>,
    pub sessions: Arc<SessionRegistry>,
}

/// GET /api/v1/feed
#[get("/api/v1/feed")]
pub async fn get_feed(
    query: web::Query<FeedQueryParams>,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let limit = query.limit.clamp(1, 100);
    let skip = query.skip;

    debug!(
        user_id = %query.user_id,
        limit,
        skip,
        "Feed request"
    );

    // Interest lookup degrades to the global feed rather than failing.
    let interests = match state.interests.interests_of(query.user_id).await {
        Ok(interests) => interests,
        Err(e) => {
            warn!(user_id = %query.user_id, error = %e, "Interest lookup failed, serving global feed");
            Vec::new()
        }
    };

    let exclude = match query.session_id {
        Some(session_id) => state
            .sessions
            .exclude_set_of(session_id)
            .await
            .unwrap_or_default(),
        None => HashSet::new(),
    };

    let page = state
        .assembler
        .personalized_feed(query.user_id, &interests, limit, skip, &exclude)
        .await?;

    Ok(HttpResponse::Ok().json(FeedResponse {
        has_more: page.has_more,
        videos: page.videos,
        limit,
        skip,
    }))
}
