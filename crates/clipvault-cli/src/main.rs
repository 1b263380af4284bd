//! Clipvault CLI: upload a recorded video once, inspect and reset the gate.
//!
//! Configuration comes from the environment (see `clipvault_core::Config`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use clipvault_cli::{build_coordinator, build_guard, failure_message, format_progress, init_tracing};
use clipvault_core::{Config, GatePolicy, MediaHandle};
use clipvault_storage::{create_storage, Storage};
use clipvault_upload::{FsContentIndex, MediaLocator, UploadGuard};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "clipvault", about = "Upload a recorded video to object storage, once")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a video unless one has already been uploaded
    Upload {
        /// Media handle: a path or file:// URI
        media: String,
    },
    /// Show whether the upload gate is closed
    Status {
        /// Media handle (required with the per_media gate policy)
        media: Option<String>,
    },
    /// Reopen the upload gate
    Reset {
        /// Media handle (required with the per_media gate policy)
        media: Option<String>,
    },
    /// Resolve a media handle to its path and size
    Locate {
        /// Media handle: a path or file:// URI
        media: String,
    },
    /// Check whether an object exists in storage
    Verify {
        /// Storage key, e.g. cameraVideos/video_20240102_030405.mp4
        key: String,
    },
}

#[derive(Serialize)]
struct GateStatus {
    policy: GatePolicy,
    flag: String,
    uploaded: bool,
}

#[derive(Serialize)]
struct ObjectStatus {
    key: String,
    exists: bool,
    size_bytes: Option<u64>,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

/// Handle the gate is checked against. Any handle works under the global policy.
fn gate_handle(guard: &UploadGuard, media: Option<String>) -> anyhow::Result<MediaHandle> {
    match (guard.policy(), media) {
        (_, Some(media)) => Ok(MediaHandle::from(media)),
        (GatePolicy::Global, None) => Ok(MediaHandle::from("")),
        (GatePolicy::PerMedia, None) => {
            anyhow::bail!("MEDIA is required when UPLOAD_GATE_POLICY is per_media")
        }
    }
}

async fn upload(config: &Config, media: String) -> anyhow::Result<()> {
    let coordinator = build_coordinator(config).await?;
    let handle = MediaHandle::from(media);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling upload");
            on_interrupt.cancel();
        }
    });

    let mut reported = false;
    let result = coordinator
        .upload_with(
            &handle,
            |progress| {
                reported = true;
                eprint!("\r{}", format_progress(&progress));
            },
            cancel,
        )
        .await;
    if reported {
        eprintln!();
    }

    match result {
        Ok(outcome) => {
            println!("{}", outcome.message());
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(failure_message(&e))),
    }
}


#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse first so --help and usage errors work without a valid environment.
    let cli = Cli::parse();
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Commands::Upload { media } => upload(&config, media).await?,
        Commands::Status { media } => {
            let guard = build_guard(&config);
            let handle = gate_handle(&guard, media)?;
            let uploaded = guard.has_uploaded(&handle).await?;
            print_json(&GateStatus {
                policy: guard.policy(),
                flag: guard.flag_key(&handle),
                uploaded,
            })?;
        }
        Commands::Reset { media } => {
            let guard = build_guard(&config);
            let handle = gate_handle(&guard, media)?;
            guard.reset(&handle).await?;
            print_json(&serde_json::json!({
                "success": true,
                "message": format!("Upload gate {} reset", guard.flag_key(&handle)),
            }))?;
        }
        Commands::Locate { media } => {
            let locator = MediaLocator::new(Arc::new(FsContentIndex::new()));
            let metadata = locator.locate(&MediaHandle::from(media)).await?;
            print_json(&metadata)?;
        }
        Commands::Verify { key } => {
            let storage = create_storage(&config)
                .await
                .context("Failed to initialize storage backend")?;
            let exists = storage.exists(&key).await?;
            let size_bytes = if exists {
                Some(storage.content_length(&key).await?)
            } else {
                None
            };
            print_json(&ObjectStatus {
                key,
                exists,
                size_bytes,
            })?;
        }
    }

    Ok(())
}
