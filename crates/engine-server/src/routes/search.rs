use axum::extract::{Query, State};
use axum::Json;
use engine_core::SearchOptions;
use serde::Deserialize;

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub limit: Option<usize>,
    pub namespace: Option<String>,
    pub rerank: Option<bool>,
}

pub async fn search(State(state): State<AppState>, Query(params): Query<SearchQuery>) -> AppResult<Json<engine_core::SearchResult>> {
    let options = SearchOptions {
        limit: params.limit.unwrap_or(state.config.search.search_default_limit),
        namespace: params.namespace,
        rerank: params.rerank.unwrap_or(false),
        use_cache: true,
        expand_context: false,
    };

    let result = state.search.hybrid_search(&params.q, &options).await?;
    Ok(Json(result))
}
