use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tracing::{error, info};

use crate::config::{ChunkServerConfig, CommonConfig};
use crate::error::AppError;
use crate::types::{categorize, Category};
use crate::util::http_client;

#[derive(Debug)]
pub struct ChunkService {
    pub server_id: String,
    pub host: String,
    pub port: u16,
    pub master_addr: String,
    pub config: ChunkServerConfig,
    pub common_config: CommonConfig,
    /// Tracks, per category, the chunk ids this node currently holds. Rebuilt from disk at
    /// startup; kept in sync on every put.
    pub held_chunks: RwLock<HashMap<Category, Vec<String>>>,
}

impl ChunkService {
    pub fn new(
        server_id: &str,
        host: &str,
        port: u16,
        master_addr: &str,
        config: ChunkServerConfig,
        common_config: CommonConfig,
    ) -> Self {
        let held_chunks = scan_existing_chunks(&config.data_path);
        Self {
            server_id: server_id.to_string(),
            host: host.to_string(),
            port,
            master_addr: master_addr.to_string(),
            config,
            common_config,
            held_chunks: RwLock::new(held_chunks),
        }
    }

    fn category_dir(&self, category: Category) -> String {
        format!("{}/{}", self.config.data_path, category.as_str())
    }

    fn chunk_path(&self, category: Category, chunk_id: &str) -> String {
        format!("{}/{}", self.category_dir(category), chunk_id)
    }

    /// Stores a chunk payload under the category derived from `filename_hint`. `data` is raw
    /// bytes if `is_binary` is false, or base64-encoded bytes if `is_binary` is true.
    pub async fn put(
        &self,
        chunk_id: &str,
        data: &str,
        is_binary: bool,
        filename_hint: &str,
    ) -> Result<Category, AppError> {
        if chunk_id.is_empty() {
            return Err(AppError::BadRequest("Missing chunk_id".to_string()));
        }

        let category = categorize(filename_hint);
        let dir = self.category_dir(category);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Internal(format!("failed to create '{}': {}", dir, e)))?;

        let bytes: Vec<u8> = if is_binary {
            BASE64
                .decode(data)
                .map_err(|e| AppError::BadRequest(format!("invalid base64 payload: {e}")))?
        } else {
            data.as_bytes().to_vec()
        };

        let path = self.chunk_path(category, chunk_id);
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| AppError::Internal(format!("failed to create '{}': {}", path, e)))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| AppError::Internal(format!("failed to write '{}': {}", path, e)))?;

        let mut held = self.held_chunks.write().await;
        let entries = held.entry(category).or_default();
        if !entries.iter().any(|c| c == chunk_id) {
            entries.push(chunk_id.to_string());
        }

        info!(
            "[put] stored chunk '{}' under category '{}'",
            chunk_id,
            category.as_str()
        );

        Ok(category)
    }

    /// Searches categories in the documented fixed order and returns the first match, decoded
    /// as text if it is valid UTF-8, or as base64-encoded bytes otherwise.
    pub async fn get(&self, chunk_id: &str) -> Result<(String, bool), AppError> {
        for category in Category::ALL {
            let path = self.chunk_path(category, chunk_id);
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    return Ok(match String::from_utf8(bytes.clone()) {
                        Ok(text) => (text, false),
                        Err(_) => (BASE64.encode(&bytes), true),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(AppError::Internal(format!(
                        "failed to read '{}': {}",
                        path, e
                    )))
                }
            }
        }

        Err(AppError::NotFound(format!(
            "chunk '{}' not found",
            chunk_id
        )))
    }

    pub async fn chunks_by_category(&self) -> HashMap<String, usize> {
        let held = self.held_chunks.read().await;
        Category::ALL
            .iter()
            .map(|c| {
                (
                    c.as_str().to_string(),
                    held.get(c).map(|v| v.len()).unwrap_or(0),
                )
            })
            .collect()
    }

    pub async fn total_chunks(&self) -> usize {
        self.held_chunks.read().await.values().map(Vec::len).sum()
    }

    pub async fn storage_info(&self) -> HashMap<String, (usize, Vec<String>)> {
        let held = self.held_chunks.read().await;
        Category::ALL
            .iter()
            .map(|c| {
                let files = held.get(c).cloned().unwrap_or_default();
                let count = files.len();
                let sample = files.into_iter().take(20).collect();
                (c.as_str().to_string(), (count, sample))
            })
            .collect()
    }

    /// Starts the cooperative heartbeat loop: posts this node's identity to the coordinator
    /// every `heartbeat_interval` seconds, for the life of the process. A failed post is
    /// logged and never affects the node's readiness to serve requests.
    pub fn start_heartbeat_loop(self: std::sync::Arc<Self>) {
        let interval = Duration::from_secs(self.common_config.heartbeat_interval.max(1));

        tokio::spawn(async move {
            let client = http_client(Duration::from_secs(5));
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;

                let body = crate::types::HeartbeatRequest {
                    server_id: self.server_id.clone(),
                    host: self.host.clone(),
                    port: self.port,
                };

                let url = format!("{}/heartbeat", self.master_addr);
                match client.post(&url).json(&body).send().await {
                    Ok(resp) if resp.status().is_success() => {
                        info!("[heartbeat] acknowledged by coordinator at {}", url);
                    }
                    Ok(resp) => {
                        error!("[heartbeat] coordinator returned {}", resp.status());
                    }
                    Err(e) => {
                        error!("[heartbeat] failed to reach coordinator at {}: {}", url, e);
                    }
                }
            }
        });
    }
}

/// Rebuilds the in-memory `held_chunks` index from whatever category directories already
/// exist under `data_path`, so a restarted node reports accurate `/health` and `/storage`
/// counts for chunks it held before the restart.
fn scan_existing_chunks(data_path: &str) -> HashMap<Category, Vec<String>> {
    let mut held = HashMap::new();
    for category in Category::ALL {
        let dir = format!("{}/{}", data_path, category.as_str());
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };

        let ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();

        if !ids.is_empty() {
            held.insert(category, ids);
        }
    }
    held
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(data_path: &str) -> ChunkService {
        ChunkService::new(
            "n0",
            "127.0.0.1",
            9100,
            "http://127.0.0.1:8000",
            ChunkServerConfig {
                bind_addr: "127.0.0.1:9100".to_string(),
                data_path: data_path.to_string(),
                master_addr: "http://127.0.0.1:8000".to_string(),
                log_path: String::new(),
            },
            CommonConfig::default(),
        )
    }

    #[tokio::test]
    async fn put_then_get_round_trips_text() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path().to_str().unwrap());

        svc.put("notes.txt_chunk_0", "hello world", false, "notes.txt")
            .await
            .unwrap();

        let (data, is_binary) = svc.get("notes.txt_chunk_0").await.unwrap();
        assert_eq!(data, "hello world");
        assert!(!is_binary);
    }

    #[tokio::test]
    async fn put_then_get_round_trips_binary() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path().to_str().unwrap());

        let payload = vec![0xFFu8, 0x00, 0xDE, 0xAD, 0xBE, 0xEF];
        let encoded = BASE64.encode(&payload);
        svc.put("photo.png_chunk_0", &encoded, true, "photo.png")
            .await
            .unwrap();

        let (data, is_binary) = svc.get("photo.png_chunk_0").await.unwrap();
        assert!(is_binary);
        assert_eq!(BASE64.decode(&data).unwrap(), payload);
    }

    #[tokio::test]
    async fn put_categorizes_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path().to_str().unwrap());

        let category = svc
            .put("report.pdf_chunk_0", "pdfdata", false, "report.pdf")
            .await
            .unwrap();
        assert_eq!(category.as_str(), "documents");
        assert!(dir.path().join("documents/report.pdf_chunk_0").exists());
    }

    #[tokio::test]
    async fn put_rejects_missing_chunk_id() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path().to_str().unwrap());

        let err = svc.put("", "data", false, "a.txt").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn get_missing_chunk_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path().to_str().unwrap());

        let err = svc.get("ghost_chunk_0").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn restart_rebuilds_held_chunks_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let svc = service(dir.path().to_str().unwrap());
            svc.put("a.txt_chunk_0", "x", false, "a.txt").await.unwrap();
        }

        let svc = service(dir.path().to_str().unwrap());
        assert_eq!(svc.total_chunks().await, 1);
        assert_eq!(svc.chunks_by_category().await.get("text"), Some(&1));
    }
}
