use std::collections::{HashMap, HashSet};

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use engine_core::{DocumentSpec, DocumentType, IngestOutcome, Uuid};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestDocumentRequest {
    pub content: String,
    pub title: String,
    pub document_type: DocumentType,
    pub namespace: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub filepath: Option<String>,
    pub url: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: HashSet<String>,
    #[serde(default)]
    pub schedule_for_review: bool,
}

#[derive(Debug, Serialize)]
pub struct IngestDocumentResponse {
    pub content_id: Uuid,
    pub success: bool,
    pub chunks_created: usize,
    pub duplicate: bool,
}

impl From<IngestDocumentRequest> for DocumentSpec {
    fn from(req: IngestDocumentRequest) -> Self {
        let filepath = req.filepath.unwrap_or_else(|| format!("{:?}/{}", req.document_type, Uuid::new_v4()));
        DocumentSpec {
            filepath,
            doc_type: req.document_type,
            title: req.title,
            content: req.content,
            url: req.url,
            namespace: req.namespace,
            tags: req.tags,
            metadata: req.metadata,
            summary: req.summary,
            youtube_segments: None,
            pdf_pages: None,
            schedule_for_review: req.schedule_for_review,
        }
    }
}

pub async fn ingest_document(
    State(state): State<AppState>,
    Json(request): Json<IngestDocumentRequest>,
) -> AppResult<(StatusCode, Json<IngestDocumentResponse>)> {
    let spec: DocumentSpec = request.into();
    let outcome = state.ingestor.ingest(spec).await?;

    let (status, body) = match outcome {
        IngestOutcome::Ingested { document_id, chunks_created } => (
            StatusCode::OK,
            IngestDocumentResponse { content_id: document_id, success: true, chunks_created, duplicate: false },
        ),
        IngestOutcome::Unchanged { document_id } => (
            StatusCode::CONFLICT,
            IngestDocumentResponse { content_id: document_id, success: true, chunks_created: 0, duplicate: true },
        ),
        IngestOutcome::Rejected { reason } => {
            return Err(AppError::bad_request(format!("content rejected: {}", reason.as_str())));
        }
    };

    Ok((status, Json(body)))
}

#[derive(Debug, Deserialize)]
pub struct BatchIngestRequest {
    pub documents: Vec<IngestDocumentRequest>,
    #[serde(default)]
    pub stop_on_error: bool,
}

#[derive(Debug, Serialize)]
pub struct BatchIngestItemResponse {
    pub index: usize,
    pub filepath: String,
    pub success: bool,
    pub content_id: Option<Uuid>,
    pub chunks_created: Option<usize>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchIngestResponse {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchIngestItemResponse>,
}

pub async fn ingest_batch(State(state): State<AppState>, Json(request): Json<BatchIngestRequest>) -> AppResult<Json<BatchIngestResponse>> {
    let specs: Vec<DocumentSpec> = request.documents.into_iter().map(DocumentSpec::from).collect();
    let result = state.ingestor.ingest_batch(specs, request.stop_on_error).await?;

    let results = result
        .results
        .into_iter()
        .map(|item| match item.outcome {
            Ok(IngestOutcome::Ingested { document_id, chunks_created }) => BatchIngestItemResponse {
                index: item.index,
                filepath: item.filepath,
                success: true,
                content_id: Some(document_id),
                chunks_created: Some(chunks_created),
                error: None,
            },
            Ok(IngestOutcome::Unchanged { document_id }) => BatchIngestItemResponse {
                index: item.index,
                filepath: item.filepath,
                success: true,
                content_id: Some(document_id),
                chunks_created: Some(0),
                error: None,
            },
            Ok(IngestOutcome::Rejected { reason }) => BatchIngestItemResponse {
                index: item.index,
                filepath: item.filepath,
                success: false,
                content_id: None,
                chunks_created: None,
                error: Some(format!("rejected: {}", reason.as_str())),
            },
            Err(e) => BatchIngestItemResponse {
                index: item.index,
                filepath: item.filepath,
                success: false,
                content_id: None,
                chunks_created: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    Ok(Json(BatchIngestResponse {
        total: result.total,
        succeeded: result.succeeded,
        failed: result.failed,
        results,
    }))
}
