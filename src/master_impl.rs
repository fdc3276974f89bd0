// Implements the coordinator's HTTP handlers, wired onto `MasterService` in `master_service.rs`.
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::AppError;
use crate::master_service::MasterService;
use crate::types::{
    AllocateChunksRequest, AllocateChunksResponse, HeartbeatRequest, HeartbeatResponse,
    LogsResponse, RegisterChunkRequest, RegisterChunkResponse, SimulateFailureRequest,
    SimulateFailureResponse, StatusResponse,
};

pub fn router(master: Arc<MasterService>) -> Router {
    Router::new()
        .route("/heartbeat", post(heartbeat))
        .route("/allocate_chunks", post(allocate_chunks))
        .route("/register_chunk", post(register_chunk))
        .route("/simulate_failure", post(simulate_failure))
        .route("/status", get(status))
        .route("/logs", get(logs))
        .with_state(master)
        .layer(CorsLayer::permissive())
}

async fn heartbeat(
    State(master): State<Arc<MasterService>>,
    Json(req): Json<HeartbeatRequest>,
) -> Json<HeartbeatResponse> {
    master.heartbeat(&req.server_id, &req.host, req.port).await;
    Json(HeartbeatResponse {
        status: "ok".to_string(),
    })
}

async fn allocate_chunks(
    State(master): State<Arc<MasterService>>,
    Json(req): Json<AllocateChunksRequest>,
) -> Result<Json<AllocateChunksResponse>, AppError> {
    let allocations = master.allocate_chunks(&req.filename, req.filesize).await?;
    Ok(Json(AllocateChunksResponse { allocations }))
}

async fn register_chunk(
    State(master): State<Arc<MasterService>>,
    Json(req): Json<RegisterChunkRequest>,
) -> Result<Json<RegisterChunkResponse>, AppError> {
    master
        .register_chunk(&req.filename, &req.chunk_id, req.servers)
        .await?;
    info!(
        "[register_chunk] '{}' registered for file '{}'",
        req.chunk_id, req.filename
    );
    Ok(Json(RegisterChunkResponse { success: true }))
}

async fn simulate_failure(
    State(master): State<Arc<MasterService>>,
    Json(req): Json<SimulateFailureRequest>,
) -> Result<Json<SimulateFailureResponse>, AppError> {
    let found = master.simulate_failure(&req.server_id).await?;
    if !found {
        return Err(AppError::NotFound(format!(
            "server '{}' not found",
            req.server_id
        )));
    }
    Ok(Json(SimulateFailureResponse { success: true }))
}

async fn status(State(master): State<Arc<MasterService>>) -> Json<StatusResponse> {
    Json(master.status().await)
}

async fn logs(State(master): State<Arc<MasterService>>) -> Json<LogsResponse> {
    Json(LogsResponse {
        logs: master.logs().await,
    })
}
