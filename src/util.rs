use std::time::Duration;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initializes the process-wide `tracing` subscriber. `log_output` selects between a plain
/// stdout writer and a rolling file writer (via `tracing-appender`) rooted at `log_path`;
/// the returned guard must be held for the life of the process or buffered file logs are lost.
pub fn init_tracing(log_level: &str, log_output: &str, log_path: &str) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if log_output == "file" {
        let path = std::path::Path::new(log_path);
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "service.log".to_string());
        let _ = std::fs::create_dir_all(dir);

        let appender = tracing_appender::rolling::daily(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        None
    }
}

/// Builds a `reqwest::Client` with the caller-side timeout every outbound RPC in this crate uses.
pub fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("reqwest client construction with only timeout/tls options never fails")
}

/// Current wall-clock time, used for heartbeat timestamps and log entries.
pub fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

/// A simple, deterministic hash used to pick a re-replication candidate for a chunk id.
/// Mirrors the source's use of `hash(chunk_id) % len(active_servers)`.
pub fn hash_index(key: &str, modulus: usize) -> usize {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    if modulus == 0 {
        return 0;
    }
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % modulus
}
