//! Resource failure policy: handler, placeholder, propagation

mod common;

use common::{svg_markup, RecordingFetcher};
use domsnap::dom::StaticDocument;
use domsnap::{CaptureOptions, Capturer, Error};
use std::sync::{Arc, Mutex};

const PAGE: &str = r#"<div id="root" style="width: 20px; height: 20px">
    <img src="missing.png"><img src="fine.png">
    <span style="background-image: url(missing-bg.png)">bg</span>
</div>"#;

async fn capture(options: &CaptureOptions) -> (domsnap::Result<String>, RecordingFetcher) {
    let fetcher = RecordingFetcher {
        failing: vec!["missing.png".into(), "missing-bg.png".into()],
        ..Default::default()
    };
    let doc = StaticDocument::builder(PAGE).with_base_url("http://acme.com/").build();
    let root = doc.select("#root").unwrap().unwrap();
    let result = Capturer::new(fetcher.clone()).to_svg(&doc, &root, options).await;
    (result, fetcher)
}

#[tokio::test]
async fn handler_is_called_and_capture_succeeds() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let options = CaptureOptions::default().with_image_error_handler(move |failure| {
        sink.lock().unwrap().push(failure.url.clone());
    });

    let (result, _) = capture(&options).await;
    let svg = svg_markup(&result.unwrap());
    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec!["http://acme.com/missing-bg.png", "http://acme.com/missing.png"]
    );
    // Failed references stay as written; the rest are embedded.
    assert!(svg.contains("src=\"missing.png\""));
    assert!(svg.contains("src=\"data:image/png;base64,AAA\""));
    assert!(svg.contains("url(missing-bg.png)"));
}

#[tokio::test]
async fn without_handler_the_capture_fails() {
    let (result, _) = capture(&CaptureOptions::default()).await;
    match result {
        Err(Error::ResourceFetchError { url, reason }) => {
            assert!(url.starts_with("http://acme.com/missing"));
            assert!(reason.contains("404"));
        }
        other => panic!("expected a fetch error, got {:?}", other),
    }
}

#[tokio::test]
async fn placeholder_replaces_failed_images() {
    let called = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&called);
    let options = CaptureOptions {
        image_placeholder: Some("data:image/png;base64,PLACEHOLDER".into()),
        ..Default::default()
    }
    .with_image_error_handler(move |_| *counter.lock().unwrap() += 1);

    let (result, _) = capture(&options).await;
    let svg = svg_markup(&result.unwrap());
    assert!(svg.contains("src=\"data:image/png;base64,PLACEHOLDER\""));
    assert!(svg.contains("url(data:image/png;base64,PLACEHOLDER)"));
    // The placeholder takes precedence over the handler.
    assert_eq!(*called.lock().unwrap(), 0);
}
