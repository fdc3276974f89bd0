//! Wire types shared between the coordinator, storage node, and client binaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in the coordinator's file directory: the ordered chunks that make up a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub filename: String,
    pub chunks: Vec<String>,
    pub upload_time: DateTime<Utc>,
}

/// One entry in the coordinator's chunk directory: which nodes hold a chunk's replicas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub filename: String,
    pub servers: Vec<String>,
}

/// A node's membership record as known to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_id: String,
    pub host: String,
    pub port: u16,
    pub last_heartbeat: DateTime<Utc>,
    pub status: NodeStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Active,
    Failed,
}

/// An allocation handed back by `POST /allocate_chunks`: one chunk's id, index, and target servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkAllocation {
    pub chunk_id: String,
    pub index: u64,
    pub servers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub server_id: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocateChunksRequest {
    pub filename: String,
    pub filesize: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocateChunksResponse {
    pub allocations: Vec<ChunkAllocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterChunkRequest {
    pub filename: String,
    pub chunk_id: String,
    pub servers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterChunkResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateFailureRequest {
    pub server_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateFailureResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatusView {
    pub host: String,
    pub port: u16,
    pub status: NodeStatus,
    pub last_heartbeat: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub servers: std::collections::HashMap<String, NodeStatusView>,
    pub files: std::collections::HashMap<String, FileEntry>,
    pub chunks: std::collections::HashMap<String, ChunkRecord>,
    pub fault_tolerance: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub server: String,
    pub event: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    pub logs: Vec<LogEntry>,
}

/// Upload body shape accepted by the storage node's `/upload` endpoint (JSON form).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkUploadRequest {
    pub chunk_id: String,
    pub data: String,
    #[serde(default)]
    pub is_binary: bool,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkUploadResponse {
    pub success: bool,
    pub chunk_id: String,
    pub server_id: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDownloadResponse {
    pub chunk_id: String,
    pub data: String,
    pub is_binary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub server_id: String,
    pub status: String,
    pub chunks_stored: usize,
    pub chunks_by_category: std::collections::HashMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub count: usize,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageInfoResponse {
    pub server_id: String,
    pub categories: std::collections::HashMap<String, CategoryInfo>,
}

/// File-category buckets a storage node partitions its on-disk area into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Text,
    Images,
    Documents,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Text => "text",
            Category::Images => "images",
            Category::Documents => "documents",
            Category::Other => "other",
        }
    }

    pub const ALL: [Category; 4] = [
        Category::Text,
        Category::Images,
        Category::Documents,
        Category::Other,
    ];
}

/// Derives the storage category from a filename's extension.
pub fn categorize(filename: &str) -> Category {
    let ext = filename
        .rsplit('.')
        .next()
        .filter(|e| *e != filename)
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "txt" | "log" | "md" | "json" | "xml" | "csv" => Category::Text,
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" | "webp" => Category::Images,
        "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" => Category::Documents,
        _ => Category::Other,
    }
}

/// Builds the canonical chunk id for a file's `index`-th chunk.
pub fn chunk_id(filename: &str, index: u64) -> String {
    format!("{}_chunk_{}", filename, index)
}
