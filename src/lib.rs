// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod output;
pub mod watch;
pub mod web;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::CliArgs;
use crate::engine::Registry;
use crate::logging::LogRing;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - the admin listener (bound first; the only fatal startup error)
/// - the task registry
/// - the config-directory watcher
/// - the admin UI server
/// - Ctrl-C handling
pub async fn run(args: CliArgs, ring: Arc<LogRing>) -> Result<()> {
    let addr = format!("localhost:{}", args.http_port);
    let listener = tokio::net::TcpListener::bind(addr.as_str())
        .await
        .with_context(|| format!("listening on admin port {}", args.http_port))?;
    info!("admin UI on http://{addr}/");

    let registry = Registry::new();
    let _watcher = watch::spawn_watcher(&args.config_dir, registry.clone())?;

    tokio::select! {
        res = web::serve(listener, registry, ring) => res,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            Ok(())
        }
    }
}
