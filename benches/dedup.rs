//! Benchmarks for the deduplication stages.
//!
//! Benchmark targets:
//! - Simhash of a ~100-word item: <100us
//! - Fingerprint dedup of 500 items: <250ms
//! - Semantic dedup of 200 items (64-dim vectors): <100ms

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::cast_precision_loss
)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use briefing::config::FingerprintSettings;
use briefing::embedding::{Embedder, HashEmbedder};
use briefing::models::Item;
use briefing::stages::fingerprint::{dedup_fingerprint, simhash};
use briefing::stages::semantic::dedup_semantic;

/// Builds a corpus where every third item is a near-duplicate repost.
fn corpus(n: usize) -> Vec<Item> {
    (0..n)
        .map(|i| {
            let base = i / 3 * 3;
            let text = if i % 3 == 0 {
                format!(
                    "Release announcement number {base} covers the scheduler, \
                     the allocator, and a batch of driver fixes for this cycle."
                )
            } else {
                format!(
                    "Release announcement number {base} covers the scheduler, \
                     the allocator, and a batch of driver fixes for this cycle. \
                     Reposted by account {i}."
                )
            };
            Item::new(text).with_url(format!("https://feed/{i}"))
        })
        .collect()
}

fn bench_simhash(c: &mut Criterion) {
    let text = "the quick brown fox jumps over the lazy dog ".repeat(12);
    c.bench_function("simhash_100_words", |b| {
        b.iter(|| simhash(black_box(&text), 64));
    });
}

fn bench_fingerprint_dedup(c: &mut Criterion) {
    let settings = FingerprintSettings {
        enabled: true,
        bits: 64,
        bands: 8,
        ham_thresh: 3,
    };
    let mut group = c.benchmark_group("fingerprint_dedup");
    for n in [100usize, 500] {
        let items = corpus(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &items, |b, items| {
            b.iter(|| dedup_fingerprint(black_box(items), &settings));
        });
    }
    group.finish();
}

fn bench_semantic_dedup(c: &mut Criterion) {
    let embedder = HashEmbedder::new(64);
    let items = corpus(200);
    let texts: Vec<&str> = items.iter().map(|i| i.text.as_str()).collect();
    let embeddings = embedder.embed_batch(&texts).expect("embeds");

    c.bench_function("semantic_dedup_200", |b| {
        b.iter(|| {
            dedup_semantic(black_box(&embeddings), black_box(&items), 0.92)
                .expect("valid input")
        });
    });
}

criterion_group!(
    benches,
    bench_simhash,
    bench_fingerprint_dedup,
    bench_semantic_dedup
);
criterion_main!(benches);
