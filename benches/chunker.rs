use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

use vsearch::services::TextChunker;

fn sample_text(chars: usize) -> String {
    "the quick brown fox jumps over the lazy dog. "
        .chars()
        .cycle()
        .take(chars)
        .collect()
}

fn bench_split(c: &mut Criterion) {
    let chunker = TextChunker::new(1000, 200);

    let mut group = c.benchmark_group("chunker_split");
    for size in [2_500usize, 25_000, 250_000] {
        let text = sample_text(size);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_function(format!("{size}_chars"), |b| {
            b.iter(|| chunker.split(black_box(&text)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_split);
criterion_main!(benches);
