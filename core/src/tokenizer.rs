use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::BTreeSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    // Anything that is neither a letter nor whitespace, including the combining
    // marks NFD splits off accented letters.
    static ref NON_ALPHA: Regex = Regex::new(r"(?u)[^\p{Alphabetic}\s]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Turns raw text into the ordered stems that get indexed or searched.
pub trait Normalizer: Send + Sync {
    fn stems(&self, text: &str) -> Vec<String>;

    /// Deduplicated, lexicographically sorted stems.
    fn unique_stems(&self, text: &str) -> BTreeSet<String> { self.stems(text).into_iter().collect() }
}

/// English Snowball stemming over [`parse`]d words.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnowballNormalizer;

impl Normalizer for SnowballNormalizer {
    fn stems(&self, text: &str) -> Vec<String> {
        parse(text).iter().map(|word| STEMMER.stem(word).into_owned()).collect()
    }
}

/// Splits text into lowercase words after NFD decomposition, dropping every
/// character that is not alphabetic. Every word is kept so positions line up
/// with the source text.
pub fn parse(text: &str) -> Vec<String> {
    let decomposed = text.nfd().collect::<String>();
    let cleaned = NON_ALPHA.replace_all(&decomposed, "").to_lowercase();
    cleaned.split_whitespace().map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_stems() {
        let t = SnowballNormalizer.stems("Running, runs run!");
        assert_eq!(t, vec!["run", "run", "run"]);
    }

    #[test]
    fn punctuation_inside_words_is_dropped() {
        assert_eq!(parse("Don't stop-me 42nd"), vec!["dont", "stopme", "nd"]);
    }
}
