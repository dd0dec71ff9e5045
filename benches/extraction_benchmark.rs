//! Heuristic extraction and item detection throughput
//!
//! Detail pages are the hot path: every directory entry is parsed once and every schema
//! field runs through selectors, label proximity and regex.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use directory_crawler::infrastructure::{FieldExtractor, ItemDetector};
use directory_crawler::{FieldSchema, Page};

fn profile_page(padding: usize) -> Page {
    let filler: String = (0..padding)
        .map(|i| format!("<p>Research note {i}: graph algorithms and distributed systems.</p>"))
        .collect();
    let markup = format!(
        r#"<html><head><title>Jane Doe</title></head><body>
        <nav><a href="/">Home</a><a href="/people">People</a></nav>
        <h1>Jane Doe</h1>
        <dl class="contact">
            <dt>Title</dt><dd>Associate Professor</dd>
            <dt>Email</dt><dd><a href="mailto:jane@example.edu">jane@example.edu</a></dd>
            <dt>Phone</dt><dd>+1 (555) 987-6543</dd>
        </dl>
        {filler}
        <p>Homepage: https://jane.example.edu/</p>
        </body></html>"#
    );
    Page::new("https://example.edu/people/jane", markup, false).unwrap()
}

fn listing_page(items: usize) -> Page {
    let entries: String = (0..items)
        .map(|i| format!(r#"<li class="person"><a href="/people/{i}">Person {i}</a><span>Lab {i}</span></li>"#))
        .collect();
    let markup = format!(
        r#"<html><body><header><a href="/">Home</a></header><ul class="directory">{entries}</ul>
        <div class="pager"><a href="/p/1">1</a><a href="/p/2">2</a><a href="/p/3">3</a></div></body></html>"#
    );
    Page::new("https://example.edu/people", markup, false).unwrap()
}

fn extraction(c: &mut Criterion) {
    let schema = FieldSchema::from_json_str(
        r#"{"name": "str", "email": "email", "phone": "phone?", "title": "str?", "website": "url?"}"#,
    )
    .unwrap();
    let extractor = FieldExtractor::new();

    let mut group = c.benchmark_group("heuristic extraction");
    for padding in [0, 50, 500] {
        let page = profile_page(padding);
        group.bench_with_input(BenchmarkId::from_parameter(padding), &page, |b, page| {
            b.iter(|| black_box(extractor.extract_heuristic(page, &schema, None)));
        });
    }
    group.finish();
}

fn detection(c: &mut Criterion) {
    let detector = ItemDetector::new();

    let mut group = c.benchmark_group("item detection");
    for items in [10, 100, 1000] {
        let page = listing_page(items);
        group.bench_with_input(BenchmarkId::from_parameter(items), &page, |b, page| {
            b.iter(|| black_box(detector.detect(page, None)));
        });
    }
    group.finish();
}

criterion_group!(benches, extraction, detection);
criterion_main!(benches);
