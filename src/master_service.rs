// Implements the internal state and control logic of the coordinator.
use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::{self, Duration};
use tracing::{error, info, warn};

use crate::config::{CommonConfig, MasterConfig};
use crate::error::AppError;
use crate::types::{
    chunk_id, ChunkAllocation, ChunkRecord, FileEntry, LogEntry, NodeInfo, NodeStatus,
    NodeStatusView, StatusResponse,
};
use crate::util::{hash_index, now};

/// The directory: the authoritative map from filenames to chunks and chunks to replica sets.
/// Snapshotted to disk as a single JSON document on every mutation.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Directory {
    pub files: HashMap<String, FileEntry>,
    pub chunks: HashMap<String, ChunkRecord>,
}

#[derive(Debug)]
pub struct MasterService {
    /// Membership table, in stable insertion order so round-robin placement is deterministic
    /// within a single allocation call.
    pub nodes: Arc<RwLock<IndexMap<String, NodeInfo>>>,
    pub directory: Arc<RwLock<Directory>>,
    pub config: MasterConfig,
    pub common_config: CommonConfig,
    pub snapshot_path: String,
}

impl MasterService {
    pub fn new(config: MasterConfig, common_config: CommonConfig, snapshot_path: &str) -> Self {
        let directory = load_snapshot(snapshot_path).unwrap_or_default();
        Self {
            nodes: Arc::new(RwLock::new(IndexMap::new())),
            directory: Arc::new(RwLock::new(directory)),
            config,
            common_config,
            snapshot_path: snapshot_path.to_string(),
        }
    }

    /// Upserts a node's membership record. Idempotent: repeated heartbeats from the same
    /// server_id just refresh `last_heartbeat` and whatever `(host, port)` it last reported.
    pub async fn heartbeat(&self, server_id: &str, host: &str, port: u16) {
        let mut nodes = self.nodes.write().await;
        nodes
            .entry(server_id.to_string())
            .and_modify(|node| {
                node.host = host.to_string();
                node.port = port;
                node.last_heartbeat = now();
                node.status = NodeStatus::Active;
            })
            .or_insert_with(|| NodeInfo {
                node_id: server_id.to_string(),
                host: host.to_string(),
                port,
                last_heartbeat: now(),
                status: NodeStatus::Active,
            });
    }

    /// Returns the currently active node ids, in stable membership order.
    async fn active_nodes(&self) -> Vec<String> {
        self.nodes
            .read()
            .await
            .values()
            .filter(|n| n.status == NodeStatus::Active)
            .map(|n| n.node_id.clone())
            .collect()
    }

    pub async fn allocate_chunks(
        &self,
        filename: &str,
        filesize: u64,
    ) -> Result<Vec<ChunkAllocation>, AppError> {
        let active = self.active_nodes().await;
        if active.is_empty() {
            return Err(AppError::NoCapacity("No active servers".to_string()));
        }

        let chunk_size = self.common_config.chunk_size.max(1);
        let num_chunks = filesize.div_ceil(chunk_size);
        let r = self.common_config.replication_factor.max(1);

        let mut allocations = Vec::with_capacity(num_chunks as usize);
        for index in 0..num_chunks {
            let replica_count = r.min(active.len());
            let servers: Vec<String> = (0..replica_count)
                .map(|k| {
                    let pos = (index as usize + k) % active.len();
                    active[pos].clone()
                })
                .collect();

            allocations.push(ChunkAllocation {
                chunk_id: chunk_id(filename, index),
                index,
                servers,
            });
        }

        info!(
            "[allocate_chunks] file '{}' ({} bytes) split into {} chunk(s) over {} active node(s)",
            filename,
            filesize,
            num_chunks,
            active.len()
        );

        Ok(allocations)
    }

    pub async fn register_chunk(
        &self,
        filename: &str,
        chunk_id: &str,
        servers: Vec<String>,
    ) -> Result<(), AppError> {
        {
            let mut directory = self.directory.write().await;

            let entry = directory
                .files
                .entry(filename.to_string())
                .or_insert_with(|| FileEntry {
                    filename: filename.to_string(),
                    chunks: Vec::new(),
                    upload_time: now(),
                });
            entry.chunks.push(chunk_id.to_string());

            directory.chunks.insert(
                chunk_id.to_string(),
                ChunkRecord {
                    chunk_id: chunk_id.to_string(),
                    filename: filename.to_string(),
                    servers,
                },
            );
        }

        self.snapshot().await?;
        Ok(())
    }

    pub async fn simulate_failure(&self, server_id: &str) -> Result<bool, AppError> {
        let found = {
            let mut nodes = self.nodes.write().await;
            match nodes.get_mut(server_id) {
                Some(node) => {
                    node.status = NodeStatus::Failed;
                    true
                }
                None => false,
            }
        };

        if found {
            warn!("[simulate_failure] node '{}' forced to failed", server_id);
            self.re_replicate(server_id).await;
        }

        Ok(found)
    }

    /// Directory-only re-replication: removes the failed node from every replica set it
    /// appears in, and tops the set back up to the replication factor by picking a
    /// deterministic candidate, without copying any chunk bytes.
    async fn re_replicate(&self, failed_node: &str) {
        let active = self.active_nodes().await;
        if active.is_empty() {
            error!(
                "[re_replicate] no active nodes; cannot repair replicas for '{}'",
                failed_node
            );
            return;
        }

        let r = self.common_config.replication_factor.max(1);
        let mut directory = self.directory.write().await;
        let mut repaired = 0usize;

        for record in directory.chunks.values_mut() {
            if !record.servers.iter().any(|s| s == failed_node) {
                continue;
            }

            record.servers.retain(|s| s != failed_node);

            if record.servers.len() < r {
                let candidate = &active[hash_index(&record.chunk_id, active.len())];
                if !record.servers.contains(candidate) {
                    record.servers.push(candidate.clone());
                }
            }
            repaired += 1;
        }
        drop(directory);

        if repaired > 0 {
            info!(
                "[re_replicate] repaired {} chunk record(s) affected by '{}'",
                repaired, failed_node
            );
            if let Err(e) = self.snapshot().await {
                error!("[re_replicate] failed to snapshot after repair: {}", e);
            }
        }
    }

    pub async fn status(&self) -> StatusResponse {
        let nodes = self.nodes.read().await;
        let directory = self.directory.read().await;

        let servers: HashMap<String, NodeStatusView> = nodes
            .iter()
            .map(|(id, n)| {
                (
                    id.clone(),
                    NodeStatusView {
                        host: n.host.clone(),
                        port: n.port,
                        status: n.status,
                        last_heartbeat: n.last_heartbeat,
                    },
                )
            })
            .collect();

        let total = nodes.len();
        let active = nodes
            .values()
            .filter(|n| n.status == NodeStatus::Active)
            .count();
        let fault_tolerance = if total == 0 {
            0.0
        } else {
            (active as f64 / total as f64) * 100.0
        };

        StatusResponse {
            servers,
            files: directory.files.clone(),
            chunks: directory.chunks.clone(),
            fault_tolerance,
            timestamp: now(),
        }
    }

    /// Derives the most recent membership events from the live membership table. This is not
    /// a persisted append-only log: it reflects current status, not history.
    pub async fn logs(&self) -> Vec<LogEntry> {
        let nodes = self.nodes.read().await;
        let mut entries: Vec<LogEntry> = nodes
            .values()
            .map(|n| LogEntry {
                timestamp: n.last_heartbeat,
                server: n.node_id.clone(),
                event: format!("Status: {:?}", n.status).to_lowercase(),
            })
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(50);
        entries
    }

    async fn snapshot(&self) -> Result<(), AppError> {
        let directory = self.directory.read().await;
        write_snapshot(&self.snapshot_path, &directory)
            .map_err(|e| AppError::Internal(format!("failed to persist snapshot: {e}")))
    }

    /// Starts the background failure detector: on each tick, any active node whose last
    /// heartbeat is older than `heartbeat_timeout` is marked failed and re-replicated.
    pub fn start_failure_detector(self: Arc<Self>) {
        let interval_secs = self.config.cron_interval.max(1);
        let timeout_secs = self.common_config.heartbeat_timeout;

        tokio::spawn(async move {
            let mut ticker = time::interval(Duration::from_secs(interval_secs));
            loop {
                ticker.tick().await;

                let timed_out: Vec<String> = {
                    let now = now();
                    let nodes = self.nodes.read().await;
                    nodes
                        .values()
                        .filter(|n| n.status == NodeStatus::Active)
                        .filter(|n| {
                            (now - n.last_heartbeat).num_seconds() > timeout_secs as i64
                        })
                        .map(|n| n.node_id.clone())
                        .collect()
                };

                if timed_out.is_empty() {
                    continue;
                }

                warn!("[failure_detector] nodes timed out: {:?}", timed_out);

                {
                    let mut nodes = self.nodes.write().await;
                    for id in &timed_out {
                        if let Some(node) = nodes.get_mut(id) {
                            node.status = NodeStatus::Failed;
                        }
                    }
                }

                for id in &timed_out {
                    self.re_replicate(id).await;
                }
            }
        });
    }
}

fn load_snapshot(path: &str) -> Option<Directory> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

fn write_snapshot(path: &str, directory: &Directory) -> io::Result<()> {
    let parent = std::path::Path::new(path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = format!("{}.tmp", path);
    let serialized = serde_json::to_string_pretty(directory)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    std::fs::write(&tmp_path, serialized)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CommonConfig, MasterConfig};

    fn service(tmp_path: &str) -> MasterService {
        MasterService::new(
            MasterConfig {
                bind_addr: String::new(),
                snapshot_path: String::new(),
                log_path: "stdout".to_string(),
                cron_interval: 5,
            },
            CommonConfig {
                replication_factor: 2,
                chunk_size: 1024 * 1024,
                heartbeat_timeout: 15,
                ..Default::default()
            },
            tmp_path,
        )
    }

    #[tokio::test]
    async fn allocation_fails_with_no_active_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let snap = dir.path().join("chunks.json");
        let svc = service(snap.to_str().unwrap());

        let err = svc.allocate_chunks("a.txt", 1024).await.unwrap_err();
        assert!(matches!(err, AppError::NoCapacity(_)));
    }

    #[tokio::test]
    async fn allocation_count_matches_chunk_size_division() {
        let dir = tempfile::tempdir().unwrap();
        let snap = dir.path().join("chunks.json");
        let svc = service(snap.to_str().unwrap());
        svc.heartbeat("n0", "localhost", 9001).await;

        let allocations = svc
            .allocate_chunks("a.txt", 1024 * 1024 * 2 + 1)
            .await
            .unwrap();
        assert_eq!(allocations.len(), 3);
        assert_eq!(allocations[0].chunk_id, "a.txt_chunk_0");
    }

    #[tokio::test]
    async fn round_robin_spreads_across_active_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let snap = dir.path().join("chunks.json");
        let svc = service(snap.to_str().unwrap());
        svc.heartbeat("n0", "h", 1).await;
        svc.heartbeat("n1", "h", 2).await;
        svc.heartbeat("n2", "h", 3).await;

        let allocations = svc
            .allocate_chunks("a.txt", 1024 * 1024 * 3)
            .await
            .unwrap();
        assert_eq!(allocations[0].servers, vec!["n0", "n1"]);
        assert_eq!(allocations[1].servers, vec!["n1", "n2"]);
        assert_eq!(allocations[2].servers, vec!["n2", "n0"]);
    }

    #[tokio::test]
    async fn simulate_failure_triggers_re_replication() {
        let dir = tempfile::tempdir().unwrap();
        let snap = dir.path().join("chunks.json");
        let svc = service(snap.to_str().unwrap());
        svc.heartbeat("n0", "h", 1).await;
        svc.heartbeat("n1", "h", 2).await;
        svc.heartbeat("n2", "h", 3).await;

        svc.register_chunk("a.txt", "a.txt_chunk_0", vec!["n0".into(), "n1".into()])
            .await
            .unwrap();

        let found = svc.simulate_failure("n0").await.unwrap();
        assert!(found);

        let directory = svc.directory.read().await;
        let record = directory.chunks.get("a.txt_chunk_0").unwrap();
        // The candidate pick is a deterministic hash of the chunk id, which may land back on
        // a survivor already in the set (see SPEC_FULL.md §4.1.4): the set is guaranteed to
        // drop the failed node and stay within bounds, but topping back up to R in a single
        // pass is best-effort, not guaranteed.
        assert!(!record.servers.is_empty() && record.servers.len() <= 2);
        assert!(!record.servers.contains(&"n0".to_string()));
        assert!(record
            .servers
            .iter()
            .all(|s| s == "n1" || s == "n2"));
    }

    #[tokio::test]
    async fn simulate_failure_unknown_node_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let snap = dir.path().join("chunks.json");
        let svc = service(snap.to_str().unwrap());
        let found = svc.simulate_failure("ghost").await.unwrap();
        assert!(!found);
    }

    #[tokio::test]
    async fn heartbeat_is_idempotent_on_repeated_calls() {
        let dir = tempfile::tempdir().unwrap();
        let snap = dir.path().join("chunks.json");
        let svc = service(snap.to_str().unwrap());
        for _ in 0..3 {
            svc.heartbeat("n0", "h", 9001).await;
        }
        let nodes = svc.nodes.read().await;
        assert_eq!(nodes.len(), 1);
    }
}
