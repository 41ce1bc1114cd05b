/// Swipe session handlers
use actix_web::{delete, post, web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::handlers::engagement::parse_swipe_direction;
use crate::services::swipe_session::{SessionRegistry, SwipeCommand};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwipeRequest {
    pub direction: String,
    pub watch_time_seconds: Option<f64>,
    /// Monotonically increasing client sequence; stale values are rejected.
    pub sequence: Option<u64>,
}

pub struct SessionHandlerState {
    pub registry: Arc<SessionRegistry>,
}

/// POST /api/v1/sessions
#[post("/api/v1/sessions")]
pub async fn start_session(
    body: web::Json<StartSessionRequest>,
    state: web::Data<SessionHandlerState>,
) -> Result<HttpResponse> {
    let started = state.registry.start_session(body.user_id).await?;
    Ok(HttpResponse::Created().json(started))
}

/// POST /api/v1/sessions/{id}/swipe
#[post("/api/v1/sessions/{id}/swipe")]
pub async fn swipe(
    path: web::Path<Uuid>,
    body: web::Json<SwipeRequest>,
    state: web::Data<SessionHandlerState>,
) -> Result<HttpResponse> {
    let session_id = path.into_inner();
    let body = body.into_inner();

    debug!(
        session_id = %session_id,
        direction = %body.direction,
        watch_time = ?body.watch_time_seconds,
        "Swipe received"
    );

    let command = SwipeCommand {
        direction: parse_swipe_direction(Some(&body.direction))?,
        watch_time_seconds: body.watch_time_seconds,
        sequence: body.sequence,
    };

    let outcome = state.registry.swipe(session_id, command).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// DELETE /api/v1/sessions/{id}
#[delete("/api/v1/sessions/{id}")]
pub async fn end_session(
    path: web::Path<Uuid>,
    state: web::Data<SessionHandlerState>,
) -> Result<HttpResponse> {
    state.registry.end_session(path.into_inner())?;
    Ok(HttpResponse::NoContent().finish())
}
