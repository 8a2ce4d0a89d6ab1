use criterion::{Criterion, black_box, criterion_group, criterion_main};
use sleuth_core::research::planner::sanitize_queries;
use sleuth_core::research::synthesis::resolve_citations;
use sleuth_core::research::{EvidenceItem, EvidenceStore, normalize_url};
use sleuth_core::search::SearchHit;

fn hits(n: usize) -> Vec<SearchHit> {
    (0..n)
        .map(|i| {
            SearchHit::new(
                format!("https://site{}.dev/article/{}?utm_source=feed#top", i % 40, i),
                format!("Article {i}"),
                "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(4),
            )
        })
        .collect()
}

fn bench_normalize_url(c: &mut Criterion) {
    c.bench_function("normalize_url_with_tracking_params", |b| {
        b.iter(|| {
            normalize_url(black_box(
                "https://www.example.com/news/2025/story/?utm_source=x&utm_medium=y#comments",
            ))
        })
    });
}

fn bench_evidence_store(c: &mut Criterion) {
    let batch = hits(200);

    c.bench_function("evidence_store_merge_200", |b| {
        b.iter(|| {
            let mut store = EvidenceStore::new();
            for hit in &batch {
                store.add_or_merge(EvidenceItem::from_hit(black_box(hit), 1200));
            }
            store
        })
    });

    let mut store = EvidenceStore::new();
    for hit in &batch {
        store.add_or_merge(EvidenceItem::from_hit(hit, 1200));
    }
    c.bench_function("evidence_store_render_context", |b| {
        b.iter(|| black_box(&store).render_context())
    });

    let answer = "Claim one [1]. Claim two [2, 3]. Unknown [999]. ".repeat(50);
    c.bench_function("resolve_citations", |b| {
        b.iter(|| resolve_citations(black_box(&answer), &store))
    });
}

fn bench_sanitize_queries(c: &mut Criterion) {
    let raw: Vec<String> = (0..50)
        .map(|i| format!("  Query Number {}  ", i % 20))
        .collect();
    c.bench_function("sanitize_queries_50", |b| {
        b.iter(|| sanitize_queries(black_box(raw.clone()), 10))
    });
}

criterion_group!(
    benches,
    bench_normalize_url,
    bench_evidence_store,
    bench_sanitize_queries
);
criterion_main!(benches);
