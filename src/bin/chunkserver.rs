// Storage node entrypoint: serves the chunk store over HTTP and runs the cooperative
// heartbeat loop for the life of the process.
use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use rustfs::chunkserver_impl::router;
use rustfs::chunkserver_service::ChunkService;
use rustfs::config::load_config_or_default;
use rustfs::util::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "chunkserver", about = "RustFS storage node")]
struct Args {
    /// Unique id this node reports in heartbeats; defaults to the bind address.
    #[arg(long)]
    id: Option<String>,

    /// Path to the TOML config file.
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Overrides `chunkserver.bind_addr`, e.g. `127.0.0.1:8001`.
    #[arg(long)]
    bind: Option<String>,

    /// Overrides `chunkserver.master_addr`, e.g. `http://127.0.0.1:8000`.
    #[arg(long)]
    master: Option<String>,

    /// Overrides `chunkserver.data_path`.
    #[arg(long)]
    data_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config_or_default(&args.config);

    let _log_guard = init_tracing(
        &config.common.log_level,
        &config.common.log_output,
        &config.chunkserver.log_path,
    );

    let bind_addr = args
        .bind
        .unwrap_or_else(|| non_empty_or(&config.chunkserver.bind_addr, "127.0.0.1:8001"));
    let master_addr = args
        .master
        .unwrap_or_else(|| non_empty_or(&config.chunkserver.master_addr, "http://127.0.0.1:8000"));
    let data_path = args
        .data_dir
        .unwrap_or_else(|| non_empty_or(&config.chunkserver.data_path, "data/chunks"));

    let addr: SocketAddr = bind_addr.parse()?;
    let server_id = args.id.unwrap_or_else(|| bind_addr.clone());

    let mut chunkserver_config = config.chunkserver.clone();
    chunkserver_config.data_path = data_path;

    let service = Arc::new(ChunkService::new(
        &server_id,
        &addr.ip().to_string(),
        addr.port(),
        &master_addr,
        chunkserver_config,
        config.common.clone(),
    ));
    service.clone().start_heartbeat_loop();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        "storage node '{}' listening on {} (coordinator at {})",
        server_id, addr, master_addr
    );

    axum::serve(listener, router(service)).await?;
    Ok(())
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}
