use criterion::{Criterion, criterion_group, criterion_main};
use ragdocs::embeddings::chunking::{ChunkingConfig, chunk_paragraphs};
use std::fmt::Write;
use std::hint::black_box;

fn synthetic_markdown(paragraphs: usize) -> String {
    let mut content = String::new();
    for i in 0..paragraphs {
        let sentence = "The retrieval layer scores every stored vector against the query. ";
        let _ = write!(content, "Paragraph {i}. ");
        for _ in 0..(i % 7 + 1) {
            content.push_str(sentence);
        }
        content.push_str("\n\n");
    }
    content
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let content = synthetic_markdown(200);
    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| chunk_paragraphs(black_box(&content), black_box(&config)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
