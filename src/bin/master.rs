// Coordinator entrypoint: serves membership/placement/directory RPCs over HTTP and runs
// the background failure detector for the life of the process.
use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use rustfs::config::load_config_or_default;
use rustfs::master_impl::router;
use rustfs::master_service::MasterService;
use rustfs::util::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "master", about = "RustFS coordinator")]
struct Args {
    /// Path to the TOML config file.
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Overrides `master.bind_addr` from the config file, e.g. `127.0.0.1:8000`.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config_or_default(&args.config);

    let _log_guard = init_tracing(
        &config.common.log_level,
        &config.common.log_output,
        &config.master.log_path,
    );

    let bind_addr = args
        .bind
        .unwrap_or_else(|| non_empty_or(&config.master.bind_addr, "127.0.0.1:8000"));
    let snapshot_path = non_empty_or(&config.master.snapshot_path, "data/chunks.json");

    let master = Arc::new(MasterService::new(
        config.master.clone(),
        config.common.clone(),
        &snapshot_path,
    ));
    master.clone().start_failure_detector();

    let addr: SocketAddr = bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("coordinator listening on {}", addr);

    axum::serve(listener, router(master)).await?;
    Ok(())
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}
