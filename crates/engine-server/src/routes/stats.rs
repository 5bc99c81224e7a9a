use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_content: usize,
    pub total_chunks: usize,
    pub by_type: std::collections::HashMap<String, usize>,
}

pub async fn stats(State(state): State<AppState>) -> AppResult<Json<StatsResponse>> {
    let stats = state.store.stats().await?;
    let by_type = stats.by_type.into_iter().map(|(t, count)| (format!("{t:?}").to_lowercase(), count)).collect();

    Ok(Json(StatsResponse {
        total_content: stats.total_documents,
        total_chunks: stats.total_chunks,
        by_type,
    }))
}
