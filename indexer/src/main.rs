use anyhow::{Context, Result};
use clap::Parser;
use index_core::builder::{add_input, add_input_threaded};
use index_core::config::{
    DEFAULT_COUNTS_PATH, DEFAULT_CRAWL_LIMIT, DEFAULT_INDEX_PATH, DEFAULT_RESULTS_PATH, DEFAULT_THREADS,
};
use index_core::{Normalizer, SearchBuilder, SharedIndex, SnowballNormalizer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build an inverted index from text files or a web crawl and run queries against it", long_about = None)]
struct Cli {
    /// Text file or directory to index
    #[arg(long)]
    path: Option<PathBuf>,
    /// Seed URL for a web crawl
    #[arg(long)]
    url: Option<String>,
    /// Maximum number of pages to crawl
    #[arg(long, default_value_t = DEFAULT_CRAWL_LIMIT)]
    limit: usize,
    /// Worker threads; enables multithreaded indexing and search
    #[arg(long, num_args = 0..=1)]
    threads: Option<Option<usize>>,
    /// Write the inverted index as JSON
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_INDEX_PATH)]
    index: Option<PathBuf>,
    /// File with one query per line
    #[arg(long)]
    query: Option<PathBuf>,
    /// Match query stems exactly instead of by prefix
    #[arg(long, default_value_t = false)]
    exact: bool,
    /// Write search results as JSON
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_RESULTS_PATH)]
    results: Option<PathBuf>,
    /// Write per-location word counts as JSON
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_COUNTS_PATH)]
    counts: Option<PathBuf>,
}

impl Cli {
    /// `None` when every step should run on the calling thread. A crawl is
    /// always multithreaded.
    fn worker_threads(&self) -> Option<usize> {
        match (self.threads, &self.url) {
            (Some(n), _) => Some(n.unwrap_or(DEFAULT_THREADS)),
            (None, Some(_)) => Some(DEFAULT_THREADS),
            (None, None) => None,
        }
    }
}

struct Driver {
    index: Arc<SharedIndex>,
    normalizer: Arc<dyn Normalizer>,
    search: Arc<SearchBuilder>,
    /// `None` runs every step on the calling thread.
    threads: Option<usize>,
}

fn main() -> Result<()> {
    // WARN unless RUST_LOG overrides it; skipped files and pages log at that level.
    let filter = EnvFilter::builder().with_default_directive(LevelFilter::WARN.into()).from_env_lossy();
    fmt().with_env_filter(filter).init();
    let cli = Cli::parse();

    let threads = cli.worker_threads();
    let index = Arc::new(SharedIndex::new());
    let normalizer: Arc<dyn Normalizer> = Arc::new(SnowballNormalizer);
    let search = Arc::new(SearchBuilder::new(Arc::clone(&index), Arc::clone(&normalizer)));
    let driver = Driver { index, normalizer, search, threads };

    // Every step runs on its own; a failure is logged and the next step still runs.
    if let Some(seed) = &cli.url {
        report(driver.crawl(seed, cli.limit));
    }
    if let Some(path) = &cli.path {
        report(driver.ingest(path));
    }
    if let Some(path) = &cli.index {
        report(driver.index.write_index_json(path).with_context(|| format!("unable to write index to {}", path.display())));
    }
    if let Some(path) = &cli.query {
        report(driver.run_queries(path, cli.exact));
    }
    if let Some(path) = &cli.results {
        report(driver.search.write_json(path).with_context(|| format!("unable to write results to {}", path.display())));
    }
    if let Some(path) = &cli.counts {
        report(driver.index.write_counts_json(path).with_context(|| format!("unable to write counts to {}", path.display())));
    }
    Ok(())
}

impl Driver {
    fn crawl(&self, seed: &str, limit: usize) -> Result<()> {
        let threads = self.threads.unwrap_or(DEFAULT_THREADS);
        let summary = crawler::crawl_web(Arc::clone(&self.index), Arc::clone(&self.normalizer), seed, limit, threads)
            .with_context(|| format!("unable to crawl from {seed}"))?;
        tracing::info!(seed, visited = summary.visited, failed = summary.failed, "crawl complete");
        Ok(())
    }

    fn ingest(&self, path: &Path) -> Result<()> {
        let summary = match self.threads {
            Some(threads) => add_input_threaded(path, &self.index, &self.normalizer, threads),
            None => add_input(path, &self.index, self.normalizer.as_ref()),
        }
        .with_context(|| format!("unable to build index from {}", path.display()))?;
        tracing::info!(path = %path.display(), indexed = summary.indexed, failed = summary.failed, "ingest complete");
        Ok(())
    }

    fn run_queries(&self, path: &Path, exact: bool) -> Result<()> {
        let lines = match self.threads {
            Some(threads) => self.search.parse_queries_threaded(path, exact, threads),
            None => self.search.parse_queries(path, exact),
        }
        .with_context(|| format!("unable to search queries from {}", path.display()))?;
        tracing::info!(path = %path.display(), lines, queries = self.search.len(), exact, "queries complete");
        Ok(())
    }
}

fn report(step: Result<()>) {
    if let Err(err) = step {
        tracing::error!("{err:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli { Cli::try_parse_from(std::iter::once("indexer").chain(args.iter().copied())).unwrap() }

    #[test]
    fn thread_count_defaults() {
        assert_eq!(parse(&["--path", "in"]).worker_threads(), None);
        assert_eq!(parse(&["--threads"]).worker_threads(), Some(DEFAULT_THREADS));
        assert_eq!(parse(&["--threads", "3"]).worker_threads(), Some(3));
        assert_eq!(parse(&["--url", "http://a.test/"]).worker_threads(), Some(DEFAULT_THREADS));
    }

    #[test]
    fn output_flags_fall_back_to_default_paths() {
        let cli = parse(&["--index", "--counts", "c.json"]);
        assert_eq!(cli.index, Some(PathBuf::from(DEFAULT_INDEX_PATH)));
        assert_eq!(cli.counts, Some(PathBuf::from("c.json")));
        assert_eq!(cli.results, None);
    }
}
