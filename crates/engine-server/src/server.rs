use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::routes;
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";
const API_KEY_HEADER: &str = "x-api-key";

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let public_routes = Router::new().route("/api/v1/health", get(routes::health::health));

    let protected_routes = Router::new()
        .route("/api/v1/search", get(routes::search::search))
        .route("/api/v1/ingest/document", post(routes::ingest::ingest_document))
        .route("/api/v1/ingest/batch", post(routes::ingest::ingest_batch))
        .route("/api/v1/ask", post(routes::ask::ask))
        .route("/api/v1/content/{id}", get(routes::content::get_content))
        .route("/api/v1/review/due", get(routes::review::due))
        .route("/api/v1/review/submit", post(routes::review::submit))
        .route("/api/v1/stats", get(routes::stats::stats))
        .route("/api/v1/tuning/weights", patch(routes::tuning::update_weights))
        .route("/api/v1/shutdown", post(routes::health::shutdown))
        .layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware));

    public_routes
        .merge(protected_routes)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

/// Stamps every response with the caller's `X-Request-ID`, generating one
/// when absent, so `AppError`'s JSON body can echo it back.
async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.headers_mut()
        .insert(REQUEST_ID_HEADER, HeaderValue::from_str(&request_id).unwrap_or_else(|_| HeaderValue::from_static("invalid")));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Validates `X-API-Key` against the configured key. Auth is skipped
/// entirely when no key is configured (development mode).
async fn auth_middleware(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, (StatusCode, axum::Json<serde_json::Value>)> {
    let Some(expected) = &state.api_key else {
        return Ok(next.run(req).await);
    };

    let provided = req.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key == expected => Ok(next.run(req).await),
        _ => {
            tracing::warn!("rejecting request with missing or invalid API key");
            Err((StatusCode::UNAUTHORIZED, axum::Json(serde_json::json!({"error": "UNAUTHORIZED", "message": "missing or invalid API key"}))))
        }
    }
}
