/// Ranking listing handlers
///
/// Thin read-only projections of the materialized ranking index. Pages are
/// offset-based over the ordering at refresh time: consistent within one
/// refresh interval, allowed to shift slightly across intervals.
use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::{ListingResponse, RankedVideo};
use crate::services::ranking_index::{HashtagSort, RankingIndex};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub skip: usize,
    /// Optional category filter.
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub skip: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashtagQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_hashtag_sort")]
    pub sort_by: String,
}

fn default_limit() -> usize {
    20
}

fn default_hashtag_sort() -> String {
    "views".to_string()
}

pub struct RankingsHandlerState {
    pub index: Arc<RankingIndex>,
}

/// GET /api/v1/rankings/trending
#[get("/api/v1/rankings/trending")]
pub async fn get_trending(
    query: web::Query<TrendingQuery>,
    state: web::Data<RankingsHandlerState>,
) -> Result<HttpResponse> {
    let limit = query.limit.clamp(1, 100);
    let snapshot = state.index.current();

    let items = match query.category.as_deref() {
        Some(category) => snapshot.category_top_k(category, limit, query.skip),
        None => snapshot.top_k(limit, query.skip),
    };

    debug!(
        limit,
        skip = query.skip,
        category = ?query.category,
        epoch = snapshot.epoch,
        returned = items.len(),
        "Trending listing served"
    );

    Ok(HttpResponse::Ok().json(listing(items, limit, query.skip, &snapshot)))
}

/// GET /api/v1/rankings/viral
#[get("/api/v1/rankings/viral")]
pub async fn get_viral(
    query: web::Query<ListingQuery>,
    state: web::Data<RankingsHandlerState>,
) -> Result<HttpResponse> {
    let limit = query.limit.clamp(1, 100);
    let snapshot = state.index.current();
    let items = snapshot.viral_top_k(limit, query.skip);

    Ok(HttpResponse::Ok().json(listing(items, limit, query.skip, &snapshot)))
}

/// GET /api/v1/rankings/category/{category}
#[get("/api/v1/rankings/category/{category}")]
pub async fn get_category_rankings(
    path: web::Path<String>,
    query: web::Query<ListingQuery>,
    state: web::Data<RankingsHandlerState>,
) -> Result<HttpResponse> {
    let category = path.into_inner();
    let limit = query.limit.clamp(1, 100);
    let snapshot = state.index.current();
    let items = snapshot.category_top_k(&category, limit, query.skip);

    Ok(HttpResponse::Ok().json(listing(items, limit, query.skip, &snapshot)))
}

/// GET /api/v1/rankings/hashtag/{hashtag}
#[get("/api/v1/rankings/hashtag/{hashtag}")]
pub async fn get_hashtag_rankings(
    path: web::Path<String>,
    query: web::Query<HashtagQuery>,
    state: web::Data<RankingsHandlerState>,
) -> Result<HttpResponse> {
    let hashtag = path.into_inner();
    let limit = query.limit.clamp(1, 100);
    let sort = parse_hashtag_sort(&query.sort_by)?;
    let snapshot = state.index.current();
    let items = snapshot.hashtag_top_k(&hashtag, sort, limit, query.skip);

    Ok(HttpResponse::Ok().json(listing(items, limit, query.skip, &snapshot)))
}

fn listing(
    items: Vec<RankedVideo>,
    limit: usize,
    skip: usize,
    snapshot: &crate::services::ranking_index::Materialization,
) -> ListingResponse {
    // Same page-full heuristic as the feed, inaccuracies included.
    let has_more = items.len() == limit;
    ListingResponse {
        items,
        has_more,
        limit,
        skip,
        refreshed_at: snapshot.refreshed_at,
    }
}

fn parse_hashtag_sort(s: &str) -> Result<HashtagSort> {
    match s.to_lowercase().as_str() {
        "views" => Ok(HashtagSort::Views),
        "likes" => Ok(HashtagSort::Likes),
        "recent" => Ok(HashtagSort::Recent),
        _ => Err(AppError::BadRequest(format!(
            "Invalid sortBy: {}. Must be one of: views, likes, recent",
            s
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hashtag_sort() {
        assert!(parse_hashtag_sort("views").is_ok());
        assert!(parse_hashtag_sort("likes").is_ok());
        assert!(parse_hashtag_sort("recent").is_ok());
        assert!(parse_hashtag_sort("relevance").is_err());
        assert!(parse_hashtag_sort("invalid").is_err());
    }

    #[test]
    fn test_default_hashtag_sort() {
        assert_eq!(default_hashtag_sort(), "views");
    }
}
