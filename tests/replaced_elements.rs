//! Snapshots of stateful and replaced elements, and generated content

mod common;

use common::{svg_markup, RecordingFetcher};
use domsnap::clone::{clone_node, ClonedElement};
use domsnap::dom::{LiveNode, StaticDocument};
use domsnap::{CaptureOptions, Capturer};

const PAGE: &str = r#"<html><head><style>
    .quote::before { content: "JUSTBEFORE"; color: green }
    .quote::after { content: "[" attr(data-tail) "]" }
    .plain::before { content: none }
</style></head><body>
<div id="root" style="width: 300px; height: 150px">
    <canvas id="content" width="10" height="10">fallback</canvas>
    <video id="movie" poster="data:image/png;base64,UE9TVEVS"></video>
    <video id="blank"></video>
    <input id="name" value="initial">
    <input id="agree" type="checkbox">
    <textarea id="notes">initial text</textarea>
    <select id="pick"><option value="a" selected>A</option><optgroup label="g"><option value="b">B</option></optgroup></select>
    <p class="quote" data-tail="end">middle</p>
    <p class="plain">plain</p>
</div></body></html>"#;

fn find<'a>(el: &'a ClonedElement, id: &str) -> &'a ClonedElement {
    fn walk<'a>(el: &'a ClonedElement, id: &str) -> Option<&'a ClonedElement> {
        if el.attr("id") == Some(id) {
            return Some(el);
        }
        el.element_children().find_map(|c| walk(c, id))
    }
    walk(el, id).unwrap_or_else(|| panic!("no element #{}", id))
}

#[tokio::test]
async fn form_state_is_captured() {
    let doc = StaticDocument::parse(PAGE);
    doc.select("#name").unwrap().unwrap().set_value("typed");
    doc.select("#agree").unwrap().unwrap().set_checked(true);
    doc.select("#notes").unwrap().unwrap().set_value("USER\nINPUT");
    doc.select("#pick").unwrap().unwrap().set_value("b");

    let root = doc.select("#root").unwrap().unwrap();
    let tree = clone_node(&root, &CaptureOptions::default()).await.unwrap();

    assert_eq!(find(&tree.root, "name").attr("value"), Some("typed"));
    assert!(find(&tree.root, "agree").attr("checked").is_some());
    assert_eq!(find(&tree.root, "notes").text_content(), "USER\nINPUT");

    let mut selected = Vec::new();
    find(&tree.root, "pick").walk(&mut |el| {
        if el.is("option") && el.attr("selected").is_some() {
            selected.push(el.attr("value").unwrap_or_default().to_string());
        }
    });
    assert_eq!(selected, vec!["b"]);
}

#[tokio::test]
async fn canvas_and_video_become_images() {
    let doc = StaticDocument::parse(PAGE);
    doc.select("#content")
        .unwrap()
        .unwrap()
        .set_canvas_bitmap("data:image/png;base64,Q0FOVkFT");
    let root = doc.select("#root").unwrap().unwrap();
    let tree = clone_node(&root, &CaptureOptions::default()).await.unwrap();

    let canvas = find(&tree.root, "content");
    assert_eq!(canvas.tag, "img");
    assert_eq!(canvas.attr("src"), Some("data:image/png;base64,Q0FOVkFT"));
    assert_eq!(canvas.attr("width"), Some("10"));
    assert!(canvas.children.is_empty());

    let movie = find(&tree.root, "movie");
    assert_eq!(movie.tag, "img");
    assert_eq!(movie.attr("src"), Some("data:image/png;base64,UE9TVEVS"));

    // Nothing painted and no poster: cloned as-is.
    assert_eq!(find(&tree.root, "blank").tag, "video");
}

#[tokio::test]
async fn blank_canvas_is_cloned_as_is() {
    let doc = StaticDocument::parse(PAGE);
    let root = doc.select("#root").unwrap().unwrap();
    let tree = clone_node(&root, &CaptureOptions::default()).await.unwrap();
    assert_eq!(find(&tree.root, "content").tag, "canvas");
}

#[tokio::test]
async fn pseudo_elements_become_spans() {
    let doc = StaticDocument::parse(PAGE);
    let root = doc.select("#root").unwrap().unwrap();
    let uri = Capturer::new(RecordingFetcher::default())
        .to_svg(&doc, &root, &CaptureOptions::default())
        .await
        .unwrap();
    let svg = svg_markup(&uri);

    let before = svg.find("JUSTBEFORE").unwrap();
    let middle = svg.find("middle").unwrap();
    let after = svg.find("[end]").unwrap();
    assert!(before < middle && middle < after);
    assert!(svg.contains("data-pseudo=\"before\""));
    assert!(svg.contains("color: green;"));
    // `content: none` generates nothing.
    assert_eq!(svg.matches("data-pseudo").count(), 2);
}

#[tokio::test]
async fn clone_is_detached_from_the_host() {
    let doc = StaticDocument::parse(PAGE);
    let name = doc.select("#name").unwrap().unwrap();
    let root = doc.select("#root").unwrap().unwrap();
    let tree = clone_node(&root, &CaptureOptions::default()).await.unwrap();

    name.set_value("changed later");
    assert_eq!(find(&tree.root, "name").attr("value"), Some("initial"));
    assert_eq!(name.form_value().as_deref(), Some("changed later"));
    assert_eq!((tree.width, tree.height), (300.0, 150.0));
}
