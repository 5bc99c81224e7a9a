use axum::extract::State;
use axum::Json;
use engine_core::QaResult;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub query: String,
}

pub async fn ask(State(state): State<AppState>, Json(request): Json<AskRequest>) -> AppResult<Json<QaResult>> {
    if request.query.trim().is_empty() {
        return Err(AppError::bad_request("query must not be empty"));
    }

    let result = state.qa.ask(&request.query).await?;
    Ok(Json(result))
}
