//! Bounded breadth-first web crawler feeding a [`SharedIndex`].
//!
//! Every page is fetched, cleaned and indexed by a task on a [`TaskScheduler`].
//! Links are admitted into a visited set until it holds `limit` URLs; each
//! admitted link becomes a new task.

pub mod error;
pub mod fetch;
pub mod html;

pub use error::CrawlError;
pub use fetch::{HttpFetcher, PageSource};

use anyhow::Context;
use index_core::{InvertedIndex, Normalizer, SchedulerHandle, SharedIndex, TaskScheduler};
use parking_lot::Mutex;
use scraper::Html;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// URLs admitted to the crawl.
    pub visited: usize,
    /// Admitted URLs that could not be fetched or indexed.
    pub failed: usize,
}

pub struct WebCrawler<S: PageSource> {
    index: Arc<SharedIndex>,
    source: Arc<S>,
    normalizer: Arc<dyn Normalizer>,
    limit: usize,
    threads: usize,
}

struct CrawlState<S: PageSource> {
    index: Arc<SharedIndex>,
    source: Arc<S>,
    normalizer: Arc<dyn Normalizer>,
    limit: usize,
    visited: Mutex<HashSet<String>>,
    failed: AtomicUsize,
    scheduler: SchedulerHandle,
}

impl<S: PageSource> WebCrawler<S> {
    pub fn new(
        index: Arc<SharedIndex>,
        source: Arc<S>,
        normalizer: Arc<dyn Normalizer>,
        limit: usize,
        threads: usize,
    ) -> Self {
        Self { index, source, normalizer, limit, threads }
    }

    /// Fetches `seed`, then crawls the links it leads to until `limit` URLs
    /// have been admitted and every admitted page has been processed.
    ///
    /// The seed only supplies the first links. It is indexed, and counts
    /// toward `limit`, only when some crawled page links back to it. A bad or
    /// unreachable seed fails the crawl; later pages that cannot be fetched
    /// are logged and counted in [`CrawlSummary::failed`].
    pub fn crawl(&self, seed: &str) -> Result<CrawlSummary, CrawlError> {
        let mut seed_url =
            Url::parse(seed.trim()).map_err(|source| CrawlError::InvalidSeed { url: seed.to_string(), source })?;
        if !matches!(seed_url.scheme(), "http" | "https") {
            return Err(CrawlError::UnsupportedScheme(seed_url.scheme().to_string()));
        }
        seed_url.set_fragment(None);
        if self.limit == 0 {
            return Ok(CrawlSummary::default());
        }

        let body = self.source.fetch(&seed_url)?;
        let links = html::extract_links(&seed_url, &Html::parse_document(&body));

        let scheduler = TaskScheduler::new(self.threads)?;
        let state = Arc::new(CrawlState {
            index: Arc::clone(&self.index),
            source: Arc::clone(&self.source),
            normalizer: Arc::clone(&self.normalizer),
            limit: self.limit,
            visited: Mutex::new(HashSet::new()),
            failed: AtomicUsize::new(0),
            scheduler: scheduler.handle(),
        });

        info!(seed = %seed_url, links = links.len(), limit = self.limit, threads = scheduler.size(), "starting crawl");
        admit(&state, links)?;
        scheduler.await_idle();
        scheduler.shutdown();

        let summary = CrawlSummary { visited: state.visited.lock().len(), failed: state.failed.load(Ordering::Relaxed) };
        info!(visited = summary.visited, failed = summary.failed, "crawl finished");
        Ok(summary)
    }
}

/// Crawls the live web from `seed` into `index` with an [`HttpFetcher`].
pub fn crawl_web(
    index: Arc<SharedIndex>,
    normalizer: Arc<dyn Normalizer>,
    seed: &str,
    limit: usize,
    threads: usize,
) -> Result<CrawlSummary, CrawlError> {
    let fetcher = HttpFetcher::new(fetch::DEFAULT_USER_AGENT, fetch::DEFAULT_TIMEOUT)?;
    WebCrawler::new(index, Arc::new(fetcher), normalizer, limit, threads).crawl(seed)
}

/// Fetches, indexes and expands a single page.
fn visit<S: PageSource>(state: &Arc<CrawlState<S>>, url: &Url) -> Result<(), CrawlError> {
    let body = state.source.fetch(url)?;
    let (links, text) = {
        let document = Html::parse_document(&body);
        (html::extract_links(url, &document), html::visible_text(&document))
    };

    let mut local = InvertedIndex::new();
    local.add_all(url.as_str(), state.normalizer.stems(&text));
    state.index.merge(local);
    debug!(url = %url, links = links.len(), "indexed page");

    admit(state, links)
}

/// Claims unseen links while the visited set has room, queueing one task
/// per claimed link before the lock is released.
fn admit<S: PageSource>(state: &Arc<CrawlState<S>>, links: Vec<Url>) -> Result<(), CrawlError> {
    let mut visited = state.visited.lock();
    for link in links {
        if visited.len() >= state.limit {
            break;
        }
        if !visited.insert(link.to_string()) {
            continue;
        }
        let task_state = Arc::clone(state);
        state.scheduler.submit(move || crawl_task(&task_state, link))?;
    }
    Ok(())
}

fn crawl_task<S: PageSource>(state: &Arc<CrawlState<S>>, url: Url) -> anyhow::Result<()> {
    let result = visit(state, &url);
    if result.is_err() {
        state.failed.fetch_add(1, Ordering::Relaxed);
    }
    result.with_context(|| format!("unable to crawl {url}"))
}
