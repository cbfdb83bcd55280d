use anyhow::{Context, Result};
use clap::Parser;
use index_core::builder::add_input_threaded;
use index_core::config::{DEFAULT_CRAWL_LIMIT, DEFAULT_PORT, DEFAULT_THREADS};
use index_core::{Normalizer, SharedIndex, SnowballNormalizer};
use server::{build_app, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "server", about = "Index text files or a web crawl, then serve a search form")]
struct Args {
    /// Text file or directory to index before serving
    #[arg(long)]
    path: Option<PathBuf>,
    /// Seed URL to crawl before serving
    #[arg(long)]
    url: Option<String>,
    /// Maximum number of pages to crawl
    #[arg(long, default_value_t = DEFAULT_CRAWL_LIMIT)]
    limit: usize,
    /// Worker threads used while indexing
    #[arg(long, default_value_t = DEFAULT_THREADS)]
    threads: usize,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // WARN unless RUST_LOG overrides it; skipped files and pages log at that level.
    let filter = EnvFilter::builder().with_default_directive(LevelFilter::WARN.into()).from_env_lossy();
    fmt().with_env_filter(filter).init();
    let args = Args::parse();

    let index = Arc::new(SharedIndex::new());
    let normalizer: Arc<dyn Normalizer> = Arc::new(SnowballNormalizer);
    let state = AppState::new(Arc::clone(&index), Arc::clone(&normalizer));

    // Indexing blocks on worker threads, so keep it off the runtime.
    let (path, url, limit, threads) = (args.path.clone(), args.url.clone(), args.limit, args.threads);
    tokio::task::spawn_blocking(move || ingest(&index, &normalizer, path, url, limit, threads))
        .await
        .context("indexing task failed")?;

    let app = build_app(state);
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Crawls and ingests what was asked for. A failed step is logged and the
/// server still starts with whatever was indexed.
fn ingest(
    index: &Arc<SharedIndex>,
    normalizer: &Arc<dyn Normalizer>,
    path: Option<PathBuf>,
    url: Option<String>,
    limit: usize,
    threads: usize,
) {
    if let Some(seed) = url {
        match crawler::crawl_web(Arc::clone(index), Arc::clone(normalizer), &seed, limit, threads) {
            Ok(summary) => tracing::info!(%seed, visited = summary.visited, failed = summary.failed, "crawl complete"),
            Err(err) => tracing::error!(%seed, error = %err, "unable to crawl"),
        }
    }
    if let Some(path) = path {
        match add_input_threaded(&path, index, normalizer, threads) {
            Ok(summary) => {
                tracing::info!(path = %path.display(), indexed = summary.indexed, failed = summary.failed, "ingest complete")
            }
            Err(err) => tracing::error!(path = %path.display(), error = %err, "unable to build index"),
        }
    }
    tracing::info!(words = index.len(), locations = index.num_locations(), "index ready");
}
