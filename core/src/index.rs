use crate::persist::write_json;
use crate::Result;
use serde::{Serialize, Serializer};
use serde_json::value::RawValue;
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::path::Path;

/// 1-based offset of a token within its location's token stream.
pub type Position = usize;

pub type Positions = BTreeSet<Position>;

/// stem -> location -> positions, all in lexicographic / ascending order.
pub type Postings = BTreeMap<String, BTreeMap<String, Positions>>;

/// Inverted index from stems to the locations and positions they occur at,
/// plus the number of tokens recorded for every location.
///
/// Not synchronized; wrap it in [`crate::SharedIndex`] to share it between threads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvertedIndex {
    postings: Postings,
    counts: BTreeMap<String, usize>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Records `stem` at `position` within `location`.
    ///
    /// Returns `false` when that triple was already present, in which case the
    /// word count of `location` is left untouched.
    pub fn add(&mut self, stem: &str, location: &str, position: Position) -> bool {
        let inserted = self
            .postings
            .entry(stem.to_owned())
            .or_default()
            .entry(location.to_owned())
            .or_default()
            .insert(position);
        if inserted {
            *self.counts.entry(location.to_owned()).or_insert(0) += 1;
        }
        inserted
    }

    /// Records a whole token stream for `location`, numbering positions from 1.
    pub fn add_all<I, S>(&mut self, location: &str, stems: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = false;
        for (offset, stem) in stems.into_iter().enumerate() {
            added |= self.add(stem.as_ref(), location, offset + 1);
        }
        added
    }

    /// Moves every entry of `other` into this index.
    ///
    /// Stems and locations missing here are adopted wholesale; shared ones get
    /// their position sets unioned. Word counts keep the larger value, which is
    /// only correct when both sides cover disjoint locations (one file or page
    /// per local index). A location present on both sides with different counts
    /// breaks that precondition and is reported.
    pub fn merge(&mut self, other: InvertedIndex) {
        for (location, theirs) in &other.counts {
            if let Some(ours) = self.counts.get(location) {
                if ours != theirs {
                    tracing::warn!(%location, ours, theirs, "merging overlapping location, word count may be under-reported");
                }
            }
        }

        for (stem, their_locations) in other.postings {
            match self.postings.entry(stem) {
                Entry::Vacant(slot) => {
                    slot.insert(their_locations);
                }
                Entry::Occupied(mut slot) => {
                    let ours = slot.get_mut();
                    for (location, positions) in their_locations {
                        match ours.entry(location) {
                            Entry::Vacant(slot) => {
                                slot.insert(positions);
                            }
                            Entry::Occupied(mut slot) => slot.get_mut().extend(positions),
                        }
                    }
                }
            }
        }

        for (location, count) in other.counts {
            let ours = self.counts.entry(location).or_insert(0);
            if *ours < count {
                *ours = count;
            }
        }
    }

    pub fn contains_word(&self, stem: &str) -> bool { self.postings.contains_key(stem) }

    pub fn contains_location(&self, stem: &str, location: &str) -> bool {
        self.postings.get(stem).map_or(false, |locations| locations.contains_key(location))
    }

    pub fn contains_position(&self, stem: &str, location: &str, position: Position) -> bool {
        self.postings
            .get(stem)
            .and_then(|locations| locations.get(location))
            .map_or(false, |positions| positions.contains(&position))
    }

    pub fn words(&self) -> impl Iterator<Item = &str> + '_ { self.postings.keys().map(String::as_str) }

    pub fn locations<'a>(&'a self, stem: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.postings.get(stem).into_iter().flat_map(|locations| locations.keys().map(String::as_str))
    }

    pub fn positions<'a>(&'a self, stem: &str, location: &str) -> impl Iterator<Item = Position> + 'a {
        self.postings
            .get(stem)
            .and_then(|locations| locations.get(location))
            .into_iter()
            .flat_map(|positions| positions.iter().copied())
    }

    pub fn counts(&self) -> &BTreeMap<String, usize> { &self.counts }

    /// Number of tokens recorded for `location`, zero when unknown.
    pub fn word_count(&self, location: &str) -> usize { self.counts.get(location).copied().unwrap_or(0) }

    /// Number of distinct stems.
    pub fn len(&self) -> usize { self.postings.len() }

    pub fn is_empty(&self) -> bool { self.postings.is_empty() }

    pub fn num_locations(&self) -> usize { self.counts.len() }

    /// Matches each query stem literally. Results come back unsorted.
    pub fn exact_search<I, S>(&self, queries: I) -> Vec<SearchResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut acc = Accumulator::new(&self.counts);
        for query in queries {
            if let Some(locations) = self.postings.get(query.as_ref()) {
                acc.add(locations);
            }
        }
        acc.finish()
    }

    /// Matches every indexed stem that starts with a query stem. Results come
    /// back unsorted.
    pub fn partial_search<I, S>(&self, queries: I) -> Vec<SearchResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut acc = Accumulator::new(&self.counts);
        for query in queries {
            let prefix = query.as_ref();
            // Stems sharing a prefix are contiguous, starting at the first stem >= prefix.
            for (stem, locations) in self.postings.range::<str, _>((Bound::Included(prefix), Bound::Unbounded)) {
                if !stem.starts_with(prefix) {
                    break;
                }
                acc.add(locations);
            }
        }
        acc.finish()
    }

    pub fn search<I, S>(&self, queries: I, exact: bool) -> Vec<SearchResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if exact {
            self.exact_search(queries)
        } else {
            self.partial_search(queries)
        }
    }

    pub fn write_index_json(&self, path: &Path) -> Result<()> { write_json(&self.postings, path) }

    pub fn write_counts_json(&self, path: &Path) -> Result<()> { write_json(&self.counts, path) }
}

/// Builds one result per location, summing matches across stems.
struct Accumulator<'a> {
    counts: &'a BTreeMap<String, usize>,
    lookup: HashMap<&'a str, usize>,
    results: Vec<SearchResult>,
}

impl<'a> Accumulator<'a> {
    fn new(counts: &'a BTreeMap<String, usize>) -> Self {
        Self { counts, lookup: HashMap::new(), results: Vec::new() }
    }

    fn add(&mut self, locations: &'a BTreeMap<String, Positions>) {
        for (location, positions) in locations {
            let slot = *self.lookup.entry(location.as_str()).or_insert_with(|| {
                self.results.push(SearchResult::new(location.clone()));
                self.results.len() - 1
            });
            let total = self.counts.get(location).copied().unwrap_or(0);
            self.results[slot].update(positions.len(), total);
        }
    }

    fn finish(self) -> Vec<SearchResult> { self.results }
}

/// One matching location for a query.
///
/// Ordered by score descending, then count descending, then location ascending.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(rename = "where")]
    pub location: String,
    pub count: usize,
    #[serde(serialize_with = "fixed_score")]
    pub score: f64,
}

impl SearchResult {
    pub fn new(location: String) -> Self { Self { location, count: 0, score: 0.0 } }

    fn update(&mut self, matches: usize, total: usize) {
        self.count += matches;
        self.score = if total == 0 { 0.0 } else { self.count as f64 / total as f64 };
    }
}

impl Ord for SearchResult {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.count.cmp(&self.count))
            .then_with(|| self.location.cmp(&other.location))
    }
}

impl PartialOrd for SearchResult {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl PartialEq for SearchResult {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for SearchResult {}

// Scores are written with exactly eight fraction digits.
fn fixed_score<S: Serializer>(score: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let raw = RawValue::from_string(format!("{score:.8}")).map_err(<S::Error as serde::ser::Error>::custom)?;
    raw.serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InvertedIndex {
        let mut index = InvertedIndex::new();
        index.add_all("a.txt", ["run", "running", "walk", "run"]);
        index.add_all("b.txt", ["runner", "walk"]);
        index
    }

    #[test]
    fn re_adding_a_triple_is_rejected() {
        let mut index = InvertedIndex::new();
        assert!(index.add("run", "a.txt", 1));
        assert!(!index.add("run", "a.txt", 1));
        assert_eq!(index.word_count("a.txt"), 1);
        assert!(index.add("run", "a.txt", 2));
        assert_eq!(index.word_count("a.txt"), 2);
    }

    #[test]
    fn add_all_numbers_positions_from_one() {
        let index = sample();
        assert_eq!(index.positions("run", "a.txt").collect::<Vec<_>>(), vec![1, 4]);
        assert_eq!(index.word_count("a.txt"), 4);
        assert_eq!(index.word_count("b.txt"), 2);
        assert!(index.contains_position("walk", "b.txt", 2));
        assert!(!index.contains_position("walk", "b.txt", 1));
    }

    #[test]
    fn add_all_reports_whether_anything_was_new() {
        let mut index = InvertedIndex::new();
        assert!(index.add_all("a.txt", ["x", "y"]));
        assert!(!index.add_all("a.txt", ["x", "y"]));
        assert!(!index.add_all("a.txt", Vec::<String>::new()));
    }

    #[test]
    fn words_and_locations_are_sorted() {
        let index = sample();
        assert_eq!(index.words().collect::<Vec<_>>(), vec!["run", "runner", "running", "walk"]);
        assert_eq!(index.locations("walk").collect::<Vec<_>>(), vec!["a.txt", "b.txt"]);
        assert_eq!(index.locations("missing").count(), 0);
    }

    #[test]
    fn self_merge_is_idempotent() {
        let mut index = sample();
        let before = index.clone();
        index.merge(before.clone());
        assert_eq!(index, before);
    }

    #[test]
    fn merge_order_does_not_matter_for_disjoint_locations() {
        let mut a = InvertedIndex::new();
        a.add_all("a.txt", ["apple", "pear"]);
        let mut b = InvertedIndex::new();
        b.add_all("b.txt", ["apple", "plum", "apple"]);
        let mut c = InvertedIndex::new();
        c.add_all("c.txt", ["pear"]);

        let mut left = a.clone();
        left.merge(b.clone());
        left.merge(c.clone());

        let mut right = c;
        let mut ab = a;
        ab.merge(b);
        right.merge(ab);

        assert_eq!(left, right);
        assert_eq!(left.word_count("b.txt"), 3);
        assert_eq!(left.locations("apple").collect::<Vec<_>>(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn merge_keeps_the_larger_count() {
        let mut big = InvertedIndex::new();
        big.add_all("a.txt", ["x", "y", "z"]);
        let mut small = InvertedIndex::new();
        small.add_all("a.txt", ["x"]);
        small.merge(big);
        assert_eq!(small.word_count("a.txt"), 3);
        assert_eq!(small.positions("x", "a.txt").collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn exact_search_matches_only_the_literal_stem() {
        let index = sample();
        let results = index.exact_search(["run"]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].location, "a.txt");
        assert_eq!(results[0].count, 2);
        assert!((results[0].score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn partial_search_matches_prefixed_stems() {
        let index = sample();
        let mut results = index.partial_search(["run"]);
        results.sort();
        assert_eq!(results.len(), 2);
        // a.txt: run x2 + running x1 out of 4 tokens.
        assert_eq!(results[0].location, "a.txt");
        assert_eq!(results[0].count, 3);
        assert_eq!(results[1].location, "b.txt");
        assert_eq!(results[1].count, 1);
    }

    #[test]
    fn partial_search_stops_at_first_non_prefix() {
        let mut index = InvertedIndex::new();
        index.add_all("a.txt", ["ru", "rum", "run", "runt", "rut"]);
        let results = index.partial_search(["run"]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].count, 2);
    }

    #[test]
    fn missing_queries_produce_no_results() {
        let index = sample();
        assert!(index.search(["zebra"], true).is_empty());
        assert!(index.search(["zebra"], false).is_empty());
        assert!(index.search(Vec::<String>::new(), false).is_empty());
    }

    #[test]
    fn higher_score_ranks_first() {
        let mut x = SearchResult::new("x".into());
        x.update(4, 10);
        let mut y = SearchResult::new("y".into());
        y.update(4, 5);
        let mut ranked = vec![x, y];
        ranked.sort();
        assert_eq!(ranked[0].location, "y");
        assert!((ranked[0].score - 0.8).abs() < 1e-12);
    }

    #[test]
    fn ties_break_on_count_then_location() {
        let mut a = SearchResult::new("b.txt".into());
        a.update(2, 4);
        let mut b = SearchResult::new("a.txt".into());
        b.update(2, 4);
        let mut c = SearchResult::new("c.txt".into());
        c.update(4, 8);
        let mut ranked = vec![a, b, c];
        ranked.sort();
        let order: Vec<_> = ranked.iter().map(|r| r.location.as_str()).collect();
        assert_eq!(order, vec!["c.txt", "a.txt", "b.txt"]);
    }

    #[test]
    fn score_serializes_with_eight_digits() {
        let mut result = SearchResult::new("a.txt".into());
        result.update(1, 3);
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"where":"a.txt","count":1,"score":0.33333333}"#);
    }
}
