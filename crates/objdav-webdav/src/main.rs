//! `objdav`: serve COPY/MOVE over an in-memory object store.
//!
//! ```bash
//! RUST_LOG=objdav_tree=debug objdav --port 8080 --seed /docs/report.txt --seed /archive/
//! curl -X MOVE -H 'Destination: /archive/report.txt' http://127.0.0.1:8080/docs/report.txt
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use objdav_tree::{MemoryBackend, NodeRegistry, TreeMutator};
use objdav_webdav::{ObjDavServer, ServerConfig};
use std::net::IpAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// WebDAV COPY/MOVE server over an in-memory object store
#[derive(Parser, Debug)]
#[command(name = "objdav", version, about)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1", env = "OBJDAV_BIND")]
    bind: IpAddr,

    /// Port to listen on (0 = auto-select)
    #[arg(short, long, default_value_t = 0, env = "OBJDAV_PORT")]
    port: u16,

    /// Entry to create before serving; a trailing `/` creates a directory
    #[arg(short, long = "seed", value_name = "PATH")]
    seeds: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let store = Arc::new(MemoryBackend::new());
    for seed in &args.seeds {
        store
            .seed(seed)
            .with_context(|| format!("Failed to seed {seed}"))?;
    }
    tracing::info!(objects = store.object_count(), "Memory store ready");

    let registry = NodeRegistry::new(store.clone(), store.root_real_path()).into_shared();
    let mutator = TreeMutator::new(store, registry);

    let config = ServerConfig {
        port: args.port,
        bind_address: args.bind,
    };
    let server = ObjDavServer::start(mutator.clone(), config)
        .await
        .context("Failed to start server")?;
    println!("Serving on {}", server.url());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    let stats = mutator.stats().snapshot();
    tracing::info!(
        copies = stats.copies,
        moves = stats.moves,
        renames = stats.renames,
        errors = stats.errors,
        avg_latency_micros = stats.avg_latency_micros,
        "Shutting down"
    );
    server.stop().await;
    Ok(())
}
