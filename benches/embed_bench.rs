use criterion::{criterion_group, criterion_main, Criterion};
use domsnap::clone::{ClonedElement, ClonedNode};
use domsnap::resource::embed::{embed_resources, scan_urls};
use domsnap::resource::{EmbedContext, FetchedResource, ResourceFetcher};
use domsnap::{CaptureOptions, VectorDocument};
use std::sync::Arc;

fn stylesheet(rules: usize) -> String {
    (0..rules)
        .map(|i| format!(".r{i} {{ background: url(\"img/{}.png\") no-repeat; color: red }}\n", i % 16))
        .collect()
}

fn bench_scan_urls(c: &mut Criterion) {
    let css = stylesheet(500);
    c.bench_function("scan_urls_500_rules", |b| b.iter(|| scan_urls(&css).len()));
}

fn bench_embed_resources(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let css = stylesheet(500);
    let fetcher: Arc<dyn ResourceFetcher> =
        Arc::new(|_url: String| async { Ok::<_, domsnap::Error>(FetchedResource::base64("AAAA")) });
    let options = CaptureOptions::default();

    // Each iteration uses a fresh context, so every capture pays its fetches.
    c.bench_function("embed_resources_16_distinct", |b| {
        b.iter(|| {
            rt.block_on(async {
                let ctx = EmbedContext::new(Arc::clone(&fetcher), &options);
                embed_resources(&css, Some("http://acme.com/"), &ctx).await.unwrap()
            })
        })
    });
}

fn bench_serialize(c: &mut Criterion) {
    let mut root = ClonedElement::new("div");
    for i in 0..1000 {
        let mut p = ClonedElement::new("p");
        p.set_attr("class", format!("row-{i}"));
        p.style.set("color", "rgb(0, 0, 0)");
        p.style.set("font-size", "15.9px");
        p.children.push(ClonedNode::Text(format!("row {i} & more <text>")));
        root.children.push(ClonedNode::Element(p));
    }
    c.bench_function("vector_document_1000_nodes", |b| {
        b.iter(|| VectorDocument::new(&root, None, 800.0, 600.0, Some("#fff")).to_data_url().len())
    });
}

criterion_group!(benches, bench_scan_urls, bench_embed_resources, bench_serialize);
criterion_main!(benches);
