use axum::extract::{Path, State};
use axum::Json;
use engine_core::{Document, Uuid};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub async fn get_content(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<Document>> {
    let document = state
        .store
        .get_document(id)
        .filter(|d| d.deleted_at.is_none())
        .ok_or_else(|| AppError::not_found(format!("no document with id {id}")))?;

    Ok(Json(document))
}
