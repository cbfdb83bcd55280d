use crate::index::InvertedIndex;
use crate::scheduler::TaskScheduler;
use crate::shared::SharedIndex;
use crate::tokenizer::Normalizer;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub indexed: usize,
    pub failed: usize,
}

/// Lists the text files under `start`, following symbolic links.
///
/// Inside directories only `.txt` and `.text` files (any case) are kept; a
/// file given directly is always returned.
pub fn find_text_files(start: &Path) -> Result<Vec<PathBuf>> {
    if !start.exists() {
        return Err(Error::MissingPath(start.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(start).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && (entry.depth() == 0 || is_text(entry.path())) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_text(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("text"))
}

/// Builds a disposable index for a single file, keyed by its path.
pub fn build_file(path: &Path, normalizer: &dyn Normalizer) -> Result<InvertedIndex> {
    let text = fs::read_to_string(path).map_err(|source| Error::Read { path: path.to_path_buf(), source })?;
    let mut local = InvertedIndex::new();
    local.add_all(&path.to_string_lossy(), normalizer.stems(&text));
    Ok(local)
}

/// Indexes every text file under `start` on the calling thread. Unreadable
/// files are logged and skipped.
pub fn add_input(start: &Path, index: &SharedIndex, normalizer: &dyn Normalizer) -> Result<BuildSummary> {
    let mut summary = BuildSummary::default();
    for file in find_text_files(start)? {
        match build_file(&file, normalizer) {
            Ok(local) => {
                index.merge(local);
                summary.indexed += 1;
            }
            Err(err) => {
                tracing::warn!(error = %err, "skipping file");
                summary.failed += 1;
            }
        }
    }
    tracing::info!(indexed = summary.indexed, failed = summary.failed, "indexed input");
    Ok(summary)
}

/// Indexes every text file under `start`, one task per file on a pool of
/// `threads` workers. Each task builds a local index and merges it once.
pub fn add_input_threaded(
    start: &Path,
    index: &Arc<SharedIndex>,
    normalizer: &Arc<dyn Normalizer>,
    threads: usize,
) -> Result<BuildSummary> {
    let files = find_text_files(start)?;
    let total = files.len();
    let failed = Arc::new(AtomicUsize::new(0));
    let scheduler = TaskScheduler::new(threads)?;
    for file in files {
        let index = Arc::clone(index);
        let normalizer = Arc::clone(normalizer);
        let failed = Arc::clone(&failed);
        scheduler.submit(move || match build_file(&file, normalizer.as_ref()) {
            Ok(local) => {
                index.merge(local);
                Ok(())
            }
            Err(err) => {
                failed.fetch_add(1, Ordering::Relaxed);
                Err(err.into())
            }
        })?;
    }
    scheduler.await_idle();
    scheduler.shutdown();

    let failed = failed.load(Ordering::Relaxed);
    let summary = BuildSummary { indexed: total - failed, failed };
    tracing::info!(indexed = summary.indexed, failed = summary.failed, threads = scheduler.size(), "indexed input");
    Ok(summary)
}
