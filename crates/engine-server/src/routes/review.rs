use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use engine_core::{ReviewItem, Uuid};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DueQuery {
    pub limit: Option<usize>,
}

pub async fn due(State(state): State<AppState>, Query(params): Query<DueQuery>) -> AppResult<Json<Vec<ReviewItem>>> {
    let limit = params.limit.unwrap_or(20);
    let items = state.scheduler.due(Utc::now(), limit);
    Ok(Json(items))
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub content_id: Uuid,
    pub rating: u8,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub next_review: chrono::DateTime<Utc>,
}

pub async fn submit(State(state): State<AppState>, Json(request): Json<SubmitRequest>) -> AppResult<Json<SubmitResponse>> {
    let rating = engine_core::Rating::from_u8(request.rating)
        .ok_or_else(|| AppError::bad_request("rating must be one of 1 (again), 2 (hard), 3 (good), 4 (easy)"))?;

    let next_review = state.scheduler.submit(request.content_id, rating, Utc::now())?;
    Ok(Json(SubmitResponse { next_review }))
}
