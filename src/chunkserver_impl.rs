// Implements the storage node's HTTP handlers, wired onto `ChunkService` in `chunkserver_service.rs`.
use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::chunkserver_service::ChunkService;
use crate::error::AppError;
use crate::types::{
    CategoryInfo, ChunkDownloadResponse, ChunkUploadRequest, ChunkUploadResponse, HealthResponse,
    StorageInfoResponse,
};

pub fn router(service: Arc<ChunkService>) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/download/{chunk_id}", get(download))
        .route("/health", get(health))
        .route("/storage", get(storage_info))
        .with_state(service)
        .layer(CorsLayer::permissive())
}

/// Accepts either the JSON body shape (`Content-Type: application/json`) or a
/// url-encoded form shape; both are treated as equivalent wire shapes on the same endpoint.
async fn upload(
    State(service): State<Arc<ChunkService>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ChunkUploadResponse>, AppError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let (chunk_id, data, is_binary, filename) = if content_type.contains("application/json") {
        let req: ChunkUploadRequest = serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("invalid JSON body: {e}")))?;
        (req.chunk_id, req.data, req.is_binary, req.filename)
    } else {
        let form: HashMap<String, String> = serde_urlencoded::from_bytes(&body)
            .map_err(|e| AppError::BadRequest(format!("invalid form body: {e}")))?;
        let chunk_id = form.get("chunk_id").cloned().unwrap_or_default();
        let data = form.get("data").cloned().unwrap_or_default();
        let is_binary = form
            .get("is_binary")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let filename = form.get("filename").cloned().unwrap_or_default();
        (chunk_id, data, is_binary, filename)
    };

    let category = service.put(&chunk_id, &data, is_binary, &filename).await?;

    Ok(Json(ChunkUploadResponse {
        success: true,
        chunk_id,
        server_id: service.server_id.clone(),
        category: category.as_str().to_string(),
    }))
}

async fn download(
    State(service): State<Arc<ChunkService>>,
    Path(chunk_id): Path<String>,
) -> Result<Json<ChunkDownloadResponse>, AppError> {
    let (data, is_binary) = service.get(&chunk_id).await?;
    Ok(Json(ChunkDownloadResponse {
        chunk_id,
        data,
        is_binary,
    }))
}

async fn health(State(service): State<Arc<ChunkService>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        server_id: service.server_id.clone(),
        status: "active".to_string(),
        chunks_stored: service.total_chunks().await,
        chunks_by_category: service.chunks_by_category().await,
    })
}

async fn storage_info(State(service): State<Arc<ChunkService>>) -> Json<StorageInfoResponse> {
    let categories = service
        .storage_info()
        .await
        .into_iter()
        .map(|(name, (count, files))| (name, CategoryInfo { count, files }))
        .collect();

    Json(StorageInfoResponse {
        server_id: service.server_id.clone(),
        categories,
    })
}
