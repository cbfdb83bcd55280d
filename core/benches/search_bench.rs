use criterion::{black_box, criterion_group, criterion_main, Criterion};
use index_core::InvertedIndex;

fn sample_index() -> InvertedIndex {
    let mut index = InvertedIndex::new();
    for doc in 0..200 {
        let words: Vec<String> = (0..500).map(|i| format!("w{}", (i * 7 + doc * 13) % 5000)).collect();
        index.add_all(&format!("doc{doc}.txt"), &words);
    }
    index
}

fn bench_search(c: &mut Criterion) {
    let index = sample_index();
    let queries = ["w1", "w42", "w4999"];
    c.bench_function("exact_search", |b| b.iter(|| index.exact_search(black_box(queries))));
    c.bench_function("partial_search", |b| b.iter(|| index.partial_search(black_box(queries))));
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
