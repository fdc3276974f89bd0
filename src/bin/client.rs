// Ingest client entrypoint: a short-lived CLI invocation that uploads or downloads one
// file per process, per SPEC_FULL.md §2 (the client holds no state between invocations).
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::error;

use rustfs::client_service::{download_file, upload_file};
use rustfs::config::load_config_or_default;
use rustfs::util::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "client", about = "RustFS ingest client")]
struct Args {
    /// Path to the TOML config file.
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Overrides `client.master_addr`, e.g. `http://127.0.0.1:8000`.
    #[arg(long)]
    master: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Chunk a local file, push replicas, and register it with the coordinator.
    Upload {
        /// Path to the local file to upload.
        path: PathBuf,
        /// Filename to register with the coordinator (defaults to the path's file name).
        #[arg(long)]
        filename: Option<String>,
    },
    /// Locate a registered file's chunks, fetch them, and reassemble to a local path.
    Download {
        /// Filename as registered with the coordinator.
        filename: String,
        /// Local path to write the reassembled file to.
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config_or_default(&args.config);

    let _log_guard = init_tracing(
        &config.common.log_level,
        &config.common.log_output,
        &config.client.log_path,
    );

    let master_addr = args
        .master
        .unwrap_or_else(|| non_empty_or(&config.client.master_addr, "http://127.0.0.1:8000"));
    let timeout = Duration::from_secs(10);

    match args.command {
        CliCommand::Upload { path, filename } => {
            let filename = filename.unwrap_or_else(|| {
                path.file_name()
                    .map(|f| f.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.to_string_lossy().to_string())
            });
            let content = tokio::fs::read(&path).await?;

            match upload_file(
                &master_addr,
                &filename,
                &content,
                config.common.chunk_size,
                timeout,
            )
            .await
            {
                Ok(true) => println!("Uploaded '{}' as '{}'", path.display(), filename),
                Ok(false) => {
                    error!("upload of '{}' partially failed", filename);
                    std::process::exit(1);
                }
                Err(e) => {
                    error!("upload of '{}' failed: {}", filename, e);
                    std::process::exit(1);
                }
            }
        }
        CliCommand::Download { filename, output } => {
            match download_file(&master_addr, &filename, &output, timeout).await {
                Ok(()) => println!("Downloaded '{}' to '{}'", filename, output.display()),
                Err(e) => {
                    error!("download of '{}' failed: {}", filename, e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}
