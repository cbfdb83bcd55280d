use crate::index::SearchResult;
use crate::persist::write_json;
use crate::scheduler::TaskScheduler;
use crate::shared::SharedIndex;
use crate::tokenizer::Normalizer;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

/// A normalized query line.
///
/// The key is the sorted unique stems joined by single spaces, so lines that
/// only differ in word order, repetition or spacing share one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    key: String,
    stems: BTreeSet<String>,
}

impl Query {
    /// Returns `None` when the line has no stems.
    pub fn parse(line: &str, normalizer: &dyn Normalizer) -> Option<Self> {
        let stems = normalizer.unique_stems(line);
        if stems.is_empty() {
            return None;
        }
        let key = stems.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
        Some(Self { key, stems })
    }

    pub fn key(&self) -> &str { &self.key }

    pub fn stems(&self) -> &BTreeSet<String> { &self.stems }
}

/// Runs `query` against `index` and sorts the results.
pub fn rank(index: &SharedIndex, query: &Query, exact: bool) -> Vec<SearchResult> {
    let mut results = index.search(query.stems(), exact);
    results.sort();
    results
}

/// Answers query lines against a shared index and caches ranked results by
/// query key.
pub struct SearchBuilder {
    index: Arc<SharedIndex>,
    normalizer: Arc<dyn Normalizer>,
    results: Mutex<BTreeMap<String, Vec<SearchResult>>>,
}

impl SearchBuilder {
    pub fn new(index: Arc<SharedIndex>, normalizer: Arc<dyn Normalizer>) -> Self {
        Self { index, normalizer, results: Mutex::new(BTreeMap::new()) }
    }

    /// Searches one raw line unless its key is already cached. Returns whether
    /// a search ran.
    ///
    /// The cache check and the insert are separate critical sections and the
    /// search itself holds no cache lock. Two threads racing on the same key may
    /// both search; the first insert is kept.
    pub fn search_line(&self, line: &str, exact: bool) -> bool {
        let Some(query) = Query::parse(line, self.normalizer.as_ref()) else {
            return false;
        };
        if self.results.lock().contains_key(query.key()) {
            return false;
        }
        let ranked = rank(&self.index, &query, exact);
        self.results.lock().entry(query.key).or_insert(ranked);
        true
    }

    /// Searches every line of `path` on the calling thread. Returns the number
    /// of lines read.
    pub fn parse_queries(&self, path: &Path, exact: bool) -> Result<usize> {
        let mut lines = 0;
        for line in open_lines(path)? {
            let line = line.map_err(|source| Error::Read { path: path.to_path_buf(), source })?;
            self.search_line(&line, exact);
            lines += 1;
        }
        Ok(lines)
    }

    /// Searches every line of `path` as its own task on a pool of `threads`
    /// workers and waits for all of them.
    pub fn parse_queries_threaded(self: &Arc<Self>, path: &Path, exact: bool, threads: usize) -> Result<usize> {
        let reader = open_lines(path)?;
        let scheduler = TaskScheduler::new(threads)?;
        let mut lines = 0;
        let mut outcome = Ok(());
        for line in reader {
            let line = match line {
                Ok(line) => line,
                Err(source) => {
                    outcome = Err(Error::Read { path: path.to_path_buf(), source });
                    break;
                }
            };
            let builder = Arc::clone(self);
            scheduler.submit(move || {
                builder.search_line(&line, exact);
                Ok(())
            })?;
            lines += 1;
        }
        scheduler.await_idle();
        scheduler.shutdown();
        outcome.map(|()| lines)
    }

    pub fn get(&self, key: &str) -> Option<Vec<SearchResult>> { self.results.lock().get(key).cloned() }

    pub fn len(&self) -> usize { self.results.lock().len() }

    pub fn is_empty(&self) -> bool { self.results.lock().is_empty() }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let results = self.results.lock();
        write_json(&*results, path)
    }
}

fn open_lines(path: &Path) -> Result<std::io::Lines<BufReader<File>>> {
    let file = File::open(path).map_err(|source| Error::Read { path: path.to_path_buf(), source })?;
    Ok(BufReader::new(file).lines())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::SnowballNormalizer;

    #[test]
    fn equivalent_lines_share_one_key() {
        let a = Query::parse("  walking the   dog dogs ", &SnowballNormalizer).unwrap();
        let b = Query::parse("dog the walk", &SnowballNormalizer).unwrap();
        assert_eq!(a.key(), "dog the walk");
        assert_eq!(a, b);
    }

    #[test]
    fn blank_lines_are_ignored() {
        assert!(Query::parse("  \t ", &SnowballNormalizer).is_none());
        assert!(Query::parse("123 !!", &SnowballNormalizer).is_none());
    }

    #[test]
    fn cached_keys_are_not_recomputed() {
        let index = Arc::new(SharedIndex::new());
        index.add_all("a.txt", ["dog", "walk"]);
        let builder = SearchBuilder::new(index, Arc::new(SnowballNormalizer));
        assert!(builder.search_line("walk dog", false));
        assert!(!builder.search_line("dogs walking", false));
        assert!(!builder.search_line("", false));
        assert_eq!(builder.len(), 1);
        let results = builder.get("dog walk").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].count, 2);
    }
}
