use crate::index::{InvertedIndex, Position, SearchResult};
use crate::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;

/// Thread-safe wrapper around an [`InvertedIndex`].
///
/// Mutations take the write lock for their whole duration, so a merge is never
/// observed half applied. Reads, searches and dumps share the read lock and
/// return owned snapshots.
#[derive(Debug, Default)]
pub struct SharedIndex {
    inner: RwLock<InvertedIndex>,
}

impl SharedIndex {
    pub fn new() -> Self { Self::default() }

    pub fn add(&self, stem: &str, location: &str, position: Position) -> bool {
        self.inner.write().add(stem, location, position)
    }

    pub fn add_all<I, S>(&self, location: &str, stems: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.write().add_all(location, stems)
    }

    /// Merges a disposable local index; see [`InvertedIndex::merge`].
    pub fn merge(&self, local: InvertedIndex) { self.inner.write().merge(local) }

    pub fn contains_word(&self, stem: &str) -> bool { self.inner.read().contains_word(stem) }

    pub fn contains_location(&self, stem: &str, location: &str) -> bool {
        self.inner.read().contains_location(stem, location)
    }

    pub fn contains_position(&self, stem: &str, location: &str, position: Position) -> bool {
        self.inner.read().contains_position(stem, location, position)
    }

    pub fn words(&self) -> Vec<String> { self.inner.read().words().map(str::to_owned).collect() }

    pub fn locations(&self, stem: &str) -> Vec<String> {
        self.inner.read().locations(stem).map(str::to_owned).collect()
    }

    pub fn positions(&self, stem: &str, location: &str) -> Vec<Position> {
        self.inner.read().positions(stem, location).collect()
    }

    pub fn counts(&self) -> BTreeMap<String, usize> { self.inner.read().counts().clone() }

    pub fn word_count(&self, location: &str) -> usize { self.inner.read().word_count(location) }

    pub fn len(&self) -> usize { self.inner.read().len() }

    pub fn is_empty(&self) -> bool { self.inner.read().is_empty() }

    pub fn num_locations(&self) -> usize { self.inner.read().num_locations() }

    pub fn exact_search<I, S>(&self, queries: I) -> Vec<SearchResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.read().exact_search(queries)
    }

    pub fn partial_search<I, S>(&self, queries: I) -> Vec<SearchResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.read().partial_search(queries)
    }

    pub fn search<I, S>(&self, queries: I, exact: bool) -> Vec<SearchResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.read().search(queries, exact)
    }

    pub fn write_index_json(&self, path: &Path) -> Result<()> { self.inner.read().write_index_json(path) }

    pub fn write_counts_json(&self, path: &Path) -> Result<()> { self.inner.read().write_counts_json(path) }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> InvertedIndex { self.inner.read().clone() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn concurrent_adds_are_never_lost() {
        let index = Arc::new(SharedIndex::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let index = Arc::clone(&index);
                thread::spawn(move || {
                    for i in 0..250 {
                        let stem = format!("stem{}", i % 17);
                        let location = format!("doc{}", t % 3);
                        assert!(index.add(&stem, &location, t * 1000 + i + 1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let total: usize = index.counts().values().sum();
        assert_eq!(total, 8 * 250);
    }

    #[test]
    fn self_merge_through_the_lock_is_idempotent() {
        let index = SharedIndex::new();
        index.add_all("a.txt", ["hello", "world", "hello"]);
        let before = index.snapshot();
        index.merge(index.snapshot());
        assert_eq!(index.snapshot(), before);
        assert_eq!(index.positions("hello", "a.txt"), vec![1, 3]);
    }
}
