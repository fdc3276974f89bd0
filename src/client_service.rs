// Implements the ingest client's chunking/fan-out/register upload path and the
// locate/fetch/reassemble download path described in SPEC_FULL.md §4.3.
use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{info, warn};

use crate::types::{
    AllocateChunksRequest, AllocateChunksResponse, ChunkDownloadResponse, ChunkUploadRequest,
    ChunkUploadResponse, RegisterChunkRequest, RegisterChunkResponse, StatusResponse,
};
use crate::util::http_client;

#[derive(Debug)]
pub enum ClientError {
    Transport(String),
    NotFound(String),
    NoCapacity(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Transport(msg) => write!(f, "transport error: {msg}"),
            ClientError::NotFound(msg) => write!(f, "not found: {msg}"),
            ClientError::NoCapacity(msg) => write!(f, "no capacity: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

/// Splits `content` into chunks per `AllocateChunks`, pushes each chunk to every assigned
/// replica, and registers the allocated set on any replica acceptance. Mirrors the source's
/// best-effort fan-out: a chunk is registered with its *allocated* servers, not just the
/// ones that actually accepted the push (see SPEC_FULL.md §4.3 and §9 open question 2).
pub async fn upload_file(
    master_addr: &str,
    filename: &str,
    content: &[u8],
    chunk_size: u64,
    timeout: Duration,
) -> Result<bool, ClientError> {
    let client = http_client(timeout);

    let alloc_resp: AllocateChunksResponse = client
        .post(format!("{master_addr}/allocate_chunks"))
        .json(&AllocateChunksRequest {
            filename: filename.to_string(),
            filesize: content.len() as u64,
        })
        .send()
        .await?
        .error_for_status()
        .map_err(|e| match e.status() {
            Some(reqwest::StatusCode::SERVICE_UNAVAILABLE) => {
                ClientError::NoCapacity("no active servers".to_string())
            }
            _ => ClientError::Transport(e.to_string()),
        })?
        .json()
        .await?;

    info!(
        "[upload] '{}' split into {} chunk(s)",
        filename,
        alloc_resp.allocations.len()
    );

    let status: StatusResponse = client
        .get(format!("{master_addr}/status"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let mut overall_success = true;

    for alloc in &alloc_resp.allocations {
        let start = (alloc.index * chunk_size) as usize;
        let end = ((alloc.index + 1) * chunk_size).min(content.len() as u64) as usize;
        let slice = &content[start.min(content.len())..end];

        let mut chunk_success = false;
        for server_id in &alloc.servers {
            let Some(base_url) = resolve_node(&status, server_id) else {
                warn!("[upload] node '{}' missing from status surface", server_id);
                continue;
            };

            let body = ChunkUploadRequest {
                chunk_id: alloc.chunk_id.clone(),
                data: BASE64.encode(slice),
                is_binary: true,
                filename: filename.to_string(),
            };

            match client
                .post(format!("{base_url}/upload"))
                .json(&body)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    chunk_success = true;
                    let _ = resp.json::<ChunkUploadResponse>().await;
                }
                Ok(resp) => {
                    warn!(
                        "[upload] node '{}' rejected chunk '{}': {}",
                        server_id,
                        alloc.chunk_id,
                        resp.status()
                    );
                }
                Err(e) => {
                    warn!(
                        "[upload] failed to reach node '{}' for chunk '{}': {}",
                        server_id, alloc.chunk_id, e
                    );
                }
            }
        }

        if chunk_success {
            let _: RegisterChunkResponse = client
                .post(format!("{master_addr}/register_chunk"))
                .json(&RegisterChunkRequest {
                    filename: filename.to_string(),
                    chunk_id: alloc.chunk_id.clone(),
                    servers: alloc.servers.clone(),
                })
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
        } else {
            overall_success = false;
        }
    }

    Ok(overall_success)
}

/// Locates a file's chunks via the coordinator's status surface, fetches each chunk from
/// the first replica that answers, and reassembles them in chunk-index order.
pub async fn download_file(
    master_addr: &str,
    filename: &str,
    output_path: &Path,
    timeout: Duration,
) -> Result<(), ClientError> {
    let client = http_client(timeout);

    let status: StatusResponse = client
        .get(format!("{master_addr}/status"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let file_entry = status
        .files
        .get(filename)
        .ok_or_else(|| ClientError::NotFound(format!("file '{filename}' not found")))?;

    let mut out = Vec::new();

    for chunk_id in &file_entry.chunks {
        let record = status
            .chunks
            .get(chunk_id)
            .ok_or_else(|| ClientError::NotFound(format!("chunk '{chunk_id}' not found")))?;

        let mut fetched = None;
        for server_id in &record.servers {
            let Some(base_url) = resolve_node(&status, server_id) else {
                continue;
            };

            match client
                .get(format!("{base_url}/download/{chunk_id}"))
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    match resp.json::<ChunkDownloadResponse>().await {
                        Ok(body) => {
                            fetched = Some(body);
                            break;
                        }
                        Err(e) => warn!("[download] malformed response for '{}': {}", chunk_id, e),
                    }
                }
                Ok(resp) => {
                    warn!(
                        "[download] node '{}' returned {} for '{}'",
                        server_id,
                        resp.status(),
                        chunk_id
                    );
                }
                Err(e) => {
                    warn!(
                        "[download] failed to reach node '{}' for '{}': {}",
                        server_id, chunk_id, e
                    );
                }
            }
        }

        let body = fetched.ok_or_else(|| {
            ClientError::NotFound(format!(
                "chunk '{chunk_id}' unavailable on any listed replica"
            ))
        })?;

        let bytes = if body.is_binary {
            BASE64
                .decode(&body.data)
                .map_err(|e| ClientError::Transport(format!("invalid base64 payload: {e}")))?
        } else {
            body.data.into_bytes()
        };
        out.extend_from_slice(&bytes);
    }

    tokio::fs::write(output_path, out)
        .await
        .map_err(|e| ClientError::Transport(format!("failed to write output file: {e}")))?;

    Ok(())
}

fn resolve_node(status: &StatusResponse, node_id: &str) -> Option<String> {
    status
        .servers
        .get(node_id)
        .map(|n| format!("http://{}:{}", n.host, n.port))
}
