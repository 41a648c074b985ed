//! SVG `<use>` references to definitions outside the captured subtree

mod common;

use common::{svg_markup, RecordingFetcher};
use domsnap::dom::StaticDocument;
use domsnap::{CaptureOptions, Capturer};

const PAGE: &str = r##"<html><body>
<svg style="display: none">
    <symbol id="icon" viewBox="0 0 10 10"><use href="#dot"/></symbol>
    <circle id="dot" cx="5" cy="5" r="4"/>
</svg>
<div id="root" style="width: 40px; height: 20px">
    <svg width="20" height="20"><use href="#icon"/></svg>
    <svg width="20" height="20"><use xlink:href="#icon"/><use href="#missing"/></svg>
</div>
<div id="local" style="width: 20px; height: 20px">
    <svg><defs><rect id="box" width="4" height="4"/></defs><use href="#box"/></svg>
</div>
</body></html>"##;

async fn capture(selector: &str) -> String {
    let doc = StaticDocument::parse(PAGE);
    let root = doc.select(selector).unwrap().unwrap();
    let uri = Capturer::new(RecordingFetcher::default())
        .to_svg(&doc, &root, &CaptureOptions::default())
        .await
        .unwrap();
    svg_markup(&uri)
}

#[tokio::test]
async fn referenced_symbols_are_copied_into_hidden_defs() {
    let svg = capture("#root").await;
    let defs = svg.find("<defs>").expect("definitions appended");
    let symbol = svg.find("<symbol").unwrap();
    assert!(defs < symbol);
    assert!(svg.find("<use href=\"#icon\"").unwrap() < defs);
    assert!(svg.contains("position: absolute;"));
    // One copy however many times it is referenced.
    assert_eq!(svg.matches("id=\"icon\"").count(), 1);
    // References inside copied definitions are followed.
    assert!(svg.contains("<circle id=\"dot\""));
}

#[tokio::test]
async fn definitions_inside_the_subtree_are_not_duplicated() {
    let svg = capture("#local").await;
    assert_eq!(svg.matches("id=\"box\"").count(), 1);
    assert_eq!(svg.matches("<defs").count(), 1);
}
