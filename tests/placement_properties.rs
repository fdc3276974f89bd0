//! Property tests for the coordinator's placement and membership invariants (SPEC_FULL.md §8).

use proptest::prelude::*;
use rustfs::config::{CommonConfig, MasterConfig};
use rustfs::master_service::MasterService;

fn service(replication_factor: usize, chunk_size: u64, tmp_path: &std::path::Path) -> MasterService {
    MasterService::new(
        MasterConfig {
            bind_addr: String::new(),
            snapshot_path: String::new(),
            log_path: "stdout".to_string(),
            cron_interval: 5,
        },
        CommonConfig {
            replication_factor,
            chunk_size,
            heartbeat_timeout: 15,
            ..CommonConfig::default()
        },
        tmp_path.to_str().unwrap(),
    )
}

proptest! {
    /// Invariant 1 — allocation count always matches ceil(filesize / CHUNK_SIZE).
    #[test]
    fn allocation_count_matches_ceil_division(filesize in 0u64..8_000_000, node_count in 1usize..6) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let chunk_size = 1024 * 1024u64;
            let svc = service(2, chunk_size, &dir.path().join("chunks.json"));
            for i in 0..node_count {
                svc.heartbeat(&format!("n{i}"), "h", 1000 + i as u16).await;
            }

            let allocations = svc.allocate_chunks("a.bin", filesize).await.unwrap();
            let expected = filesize.div_ceil(chunk_size);
            prop_assert_eq!(allocations.len() as u64, expected);
        });
    }

    /// Invariant 2 — every allocation's replica set size is between 1 and min(R, active nodes).
    #[test]
    fn replica_set_size_is_bounded(node_count in 1usize..6, r in 1usize..4, filesize in 1u64..4_000_000) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let svc = service(r, 1024 * 1024, &dir.path().join("chunks.json"));
            for i in 0..node_count {
                svc.heartbeat(&format!("n{i}"), "h", 1000 + i as u16).await;
            }

            let allocations = svc.allocate_chunks("a.bin", filesize).await.unwrap();
            let expected = r.min(node_count);
            for alloc in &allocations {
                prop_assert!(alloc.servers.len() >= 1);
                prop_assert_eq!(alloc.servers.len(), expected);
            }
        });
    }

    /// Invariant 4 — chunk ids always take the `<filename>_chunk_<index>` form.
    #[test]
    fn chunk_id_format_matches_filename_and_index(filesize in 1u64..4_000_000) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let svc = service(2, 1024 * 1024, &dir.path().join("chunks.json"));
            svc.heartbeat("n0", "h", 1000).await;

            let allocations = svc.allocate_chunks("report.pdf", filesize).await.unwrap();
            for (i, alloc) in allocations.iter().enumerate() {
                prop_assert_eq!(&alloc.chunk_id, &format!("report.pdf_chunk_{i}"));
                prop_assert_eq!(alloc.index, i as u64);
            }
        });
    }

    /// Invariant 9 — K consecutive heartbeats from the same node collapse to one membership
    /// entry carrying the most recently reported `(host, port)`.
    #[test]
    fn repeated_heartbeats_collapse_to_one_entry(k in 1usize..20, port in 1000u16..9000) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let svc = service(2, 1024 * 1024, &dir.path().join("chunks.json"));

            for _ in 0..k {
                svc.heartbeat("n0", "127.0.0.1", port).await;
            }

            let nodes = svc.nodes.read().await;
            prop_assert_eq!(nodes.len(), 1);
            prop_assert_eq!(nodes.get("n0").unwrap().port, port);
        });
    }
}

/// Invariant 3 — round-robin spread is balanced to within 1 assignment per node over the
/// first `k` chunks when `|active| >= R`.
#[tokio::test]
async fn round_robin_spread_is_balanced() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(2, 1024, &dir.path().join("chunks.json"));
    for i in 0..4 {
        svc.heartbeat(&format!("n{i}"), "h", 1000 + i).await;
    }

    let allocations = svc.allocate_chunks("a.bin", 1024 * 10).await.unwrap();

    let mut counts = std::collections::HashMap::new();
    for alloc in &allocations {
        for server in &alloc.servers {
            *counts.entry(server.clone()).or_insert(0) += 1;
        }
    }

    let min = *counts.values().min().unwrap();
    let max = *counts.values().max().unwrap();
    assert!(max - min <= 1, "counts not balanced: {:?}", counts);
}
