use index_core::tokenizer::{parse, Normalizer, SnowballNormalizer};

#[test]
fn it_normalizes_and_stems() {
    let words = SnowballNormalizer.stems("Running Runners RUN! The café's menu.");
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    // Accents are stripped after decomposition: café -> cafe
    assert!(words.contains(&"cafe".to_string()));
}

#[test]
fn it_keeps_every_word_in_order() {
    let words = parse("The quick brown fox and the lazy dog");
    assert_eq!(words, vec!["the", "quick", "brown", "fox", "and", "the", "lazy", "dog"]);
}

#[test]
fn unique_stems_are_sorted_and_deduplicated() {
    let stems = SnowballNormalizer.unique_stems("walks walking apple Apples");
    assert_eq!(stems.into_iter().collect::<Vec<_>>(), vec!["appl", "walk"]);
}
