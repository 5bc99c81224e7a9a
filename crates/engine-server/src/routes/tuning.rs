use axum::extract::State;
use axum::Json;
use engine_core::SearchWeights;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TuningRequest {
    pub bm25_weight: Option<f32>,
    pub vector_weight: Option<f32>,
    pub rrf_k: Option<u32>,
    pub quality_boost_alpha: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct TuningResponse {
    pub bm25_weight: f32,
    pub vector_weight: f32,
    pub rrf_k: u32,
    pub quality_boost_alpha: f32,
}

/// Merges the given fields onto the current weight snapshot and publishes it
/// atomically, bumping the search cache namespace so nothing stale computed
/// under the old weights is ever served.
pub async fn update_weights(State(state): State<AppState>, Json(request): Json<TuningRequest>) -> AppResult<Json<TuningResponse>> {
    let current = state.search.weights();

    let bm25_weight = request.bm25_weight.unwrap_or(current.bm25_weight);
    let vector_weight = request.vector_weight.unwrap_or(current.vector_weight);
    let rrf_k = request.rrf_k.unwrap_or(current.rrf_k);
    let quality_boost_alpha = request.quality_boost_alpha.unwrap_or(current.quality_boost_alpha);

    if bm25_weight + vector_weight <= 0.0 {
        return Err(AppError::bad_request("bm25_weight + vector_weight must be > 0"));
    }
    if rrf_k == 0 {
        return Err(AppError::bad_request("rrf_k must be > 0"));
    }

    let updated = SearchWeights {
        bm25_weight,
        vector_weight,
        rrf_k,
        quality_boost_alpha,
    };
    state.search.update_weights(updated.clone());

    Ok(Json(TuningResponse {
        bm25_weight: updated.bm25_weight,
        vector_weight: updated.vector_weight,
        rrf_k: updated.rrf_k,
        quality_boost_alpha: updated.quality_boost_alpha,
    }))
}
