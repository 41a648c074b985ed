//! Node cloner and style snapshotter
//!
//! Walks a live subtree in document order and produces an owned
//! [`ClonedElement`] tree: every element carries its resolved computed style
//! as an inline declaration block, replaced elements carry a snapshot of
//! their current state and `::before`/`::after` content becomes real
//! children. Nothing in the result refers back to the live document.

mod pseudo;
mod snapshot;

pub use pseudo::resolve_content;

use futures::future::{BoxFuture, FutureExt};
use log::debug;
use std::collections::HashSet;

use crate::dom::{ComputedStyle, ElementKind, LiveNode, NodeType};
use crate::options::{kebab_case, FilterNode};
use crate::{CaptureOptions, Error, Result};

/// Inline style of a cloned element
pub type StyleDeclaration = ComputedStyle;

/// Namespace an element is serialized in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Namespace {
    #[default]
    Html,
    Svg,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClonedNode {
    Element(ClonedElement),
    Text(String),
}

impl ClonedNode {
    pub fn as_element(&self) -> Option<&ClonedElement> {
        match self {
            ClonedNode::Element(el) => Some(el),
            ClonedNode::Text(_) => None,
        }
    }
}

/// An inert copy of a live element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClonedElement {
    pub tag: String,
    pub namespace: Namespace,
    pub attributes: Vec<(String, String)>,
    pub style: StyleDeclaration,
    pub children: Vec<ClonedNode>,
}

impl ClonedElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into(), ..Default::default() }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attributes.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    pub fn element_children(&self) -> impl Iterator<Item = &ClonedElement> {
        self.children.iter().filter_map(ClonedNode::as_element)
    }

    pub fn element_children_mut(&mut self) -> impl Iterator<Item = &mut ClonedElement> {
        self.children.iter_mut().filter_map(|c| match c {
            ClonedNode::Element(el) => Some(el),
            ClonedNode::Text(_) => None,
        })
    }

    /// Concatenated text of all descendants
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Depth-first visit of this element and its element descendants
    pub fn walk<F: FnMut(&ClonedElement)>(&self, f: &mut F) {
        f(self);
        for child in self.element_children() {
            child.walk(f);
        }
    }
}

fn collect_text(el: &ClonedElement, out: &mut String) {
    for child in &el.children {
        match child {
            ClonedNode::Text(t) => out.push_str(t),
            ClonedNode::Element(e) => collect_text(e, out),
        }
    }
}

/// Result of cloning: the owned tree plus the source's natural size
#[derive(Debug, Clone, PartialEq)]
pub struct ClonedTree {
    pub root: ClonedElement,
    pub width: f64,
    pub height: f64,
}

/// Deep-clone `node` with its computed state.
///
/// The filter is never applied to `node` itself. A computed-style failure
/// anywhere in the subtree fails the whole clone.
pub async fn clone_node<N: LiveNode>(node: &N, options: &CaptureOptions) -> Result<ClonedTree> {
    if node.node_type() != NodeType::Element {
        return Err(Error::ConfigError("capture root must be an element".into()));
    }
    let (width, height) = node.scroll_size();
    match clone_tree(node, options, Namespace::Html, true).await? {
        Some(ClonedNode::Element(mut root)) => {
            copy_use_definitions(node, &mut root, options).await?;
            debug!("cloned <{}> ({}x{})", root.tag, width, height);
            Ok(ClonedTree { root, width, height })
        }
        _ => Err(Error::Other("capture root produced no element".into())),
    }
}

fn clone_tree<'a, N: LiveNode>(
    node: &'a N,
    options: &'a CaptureOptions,
    parent_namespace: Namespace,
    is_root: bool,
) -> BoxFuture<'a, Result<Option<ClonedNode>>> {
    async move {
        let node_type = node.node_type();
        if node_type == NodeType::Other {
            return Ok(None);
        }

        let tag = node.tag_name();
        let attributes = node.attributes();
        let text = node.text();

        if !is_root && !passes_filter(options, node_type, &tag, &attributes, text.as_deref()) {
            return Ok(None);
        }

        if node_type == NodeType::Text {
            return Ok(text.map(ClonedNode::Text));
        }

        node.ready().await;

        let kind = ElementKind::from_tag(&tag);
        let namespace = if tag.eq_ignore_ascii_case("svg") {
            Namespace::Svg
        } else {
            parent_namespace
        };
        let child_namespace = if namespace == Namespace::Svg && tag.eq_ignore_ascii_case("foreignObject") {
            Namespace::Html
        } else {
            namespace
        };

        let mut el = ClonedElement {
            tag,
            namespace,
            attributes,
            ..Default::default()
        };

        let state = snapshot::take(kind, node);
        let replaced = snapshot::replace_element(&mut el, &state);

        if !replaced {
            for child in node.children() {
                if let Some(cloned) = clone_tree(&child, options, child_namespace, false).await? {
                    el.children.push(cloned);
                }
            }
        }

        copy_style(node, &mut el, kind, options)?;
        if !replaced && namespace == Namespace::Html {
            pseudo::clone_pseudo_elements(node, &mut el, options)?;
        }
        snapshot::apply_values(&mut el, state);

        Ok(Some(ClonedNode::Element(el)))
    }
    .boxed()
}

/// Copy elements that `<use>` references from outside the clone into a
/// hidden `<svg><defs>` appended to `root`.
///
/// Copied definitions may reference further ids; those are followed too.
async fn copy_use_definitions<N: LiveNode>(
    node: &N,
    root: &mut ClonedElement,
    options: &CaptureOptions,
) -> Result<()> {
    let mut pending = Vec::new();
    use_references(root, &mut pending);
    let mut seen = HashSet::new();
    let mut defs = ClonedElement::new("defs");
    defs.namespace = Namespace::Svg;

    let mut next = 0;
    while next < pending.len() {
        let id = pending[next].clone();
        next += 1;
        if !seen.insert(id.clone()) || contains_id(root, &id) {
            continue;
        }
        let Some(target) = node.element_by_id(&id) else {
            debug!("<use> reference #{} not found", id);
            continue;
        };
        if let Some(ClonedNode::Element(copy)) = clone_tree(&target, options, Namespace::Svg, true).await? {
            use_references(&copy, &mut pending);
            defs.children.push(ClonedNode::Element(copy));
        }
    }
    if defs.children.is_empty() {
        return Ok(());
    }

    let mut svg = ClonedElement::new("svg");
    svg.namespace = Namespace::Svg;
    for (name, value) in [("position", "absolute"), ("width", "0"), ("height", "0"), ("overflow", "hidden")] {
        svg.style.set(name, value);
    }
    svg.children.push(ClonedNode::Element(defs));
    root.children.push(ClonedNode::Element(svg));
    Ok(())
}

/// Local fragment ids named by `<use href>`/`<use xlink:href>` under `el`
fn use_references(el: &ClonedElement, out: &mut Vec<String>) {
    el.walk(&mut |e| {
        if !e.is("use") {
            return;
        }
        let id = e
            .attr("href")
            .or_else(|| e.attr("xlink:href"))
            .and_then(|href| href.strip_prefix('#'));
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            if !out.iter().any(|known| known == id) {
                out.push(id.to_string());
            }
        }
    });
}

fn contains_id(el: &ClonedElement, id: &str) -> bool {
    let mut found = false;
    el.walk(&mut |e| found |= e.attr("id") == Some(id));
    found
}

fn passes_filter(
    options: &CaptureOptions,
    node_type: NodeType,
    tag: &str,
    attributes: &[(String, String)],
    text: Option<&str>,
) -> bool {
    let Some(filter) = &options.filter else {
        return true;
    };
    let view = FilterNode {
        tag: (node_type == NodeType::Element).then_some(tag),
        attributes,
        text,
    };
    filter(&view)
}

pub(crate) fn style_capture_error(tag: &str, err: Error) -> Error {
    match err {
        Error::StyleCaptureError(_) => err,
        other => Error::StyleCaptureError(format!("<{}>: {}", tag, other)),
    }
}

fn copy_style<N: LiveNode>(
    node: &N,
    el: &mut ClonedElement,
    kind: ElementKind,
    options: &CaptureOptions,
) -> Result<()> {
    let computed = node
        .computed_style(None)
        .map_err(|e| style_capture_error(&el.tag, e))?;
    for (name, value) in computed.iter() {
        if !options.keeps_property(name) {
            continue;
        }
        let value = adjust_value(name, value, kind, el);
        el.style.set(name, value);
    }
    Ok(())
}

fn adjust_value(name: &str, value: &str, kind: ElementKind, el: &ClonedElement) -> String {
    match name {
        // Snapshots re-wrap text slightly wider than the host does.
        "font-size" => match value.strip_suffix("px").and_then(|v| v.trim().parse::<f64>().ok()) {
            Some(px) => format!("{}px", (px.floor() - 0.1).max(0.0)),
            None => value.to_string(),
        },
        "display" if kind == ElementKind::Iframe && value == "inline" => "block".to_string(),
        "d" => match el.attr("d") {
            Some(d) => format!("path(\"{}\")", d),
            None => value.to_string(),
        },
        _ => value.to_string(),
    }
}

/// Apply size and style overrides to the cloned root.
pub fn apply_style(root: &mut ClonedElement, options: &CaptureOptions) {
    if let Some(width) = options.width {
        root.style.set("width", format!("{}px", width));
    }
    if let Some(height) = options.height {
        root.style.set("height", format!("{}px", height));
    }
    for (name, value) in &options.style {
        root.style.set(kebab_case(name), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_size_is_floored_and_reduced() {
        let el = ClonedElement::new("p");
        assert_eq!(adjust_value("font-size", "16px", ElementKind::Other, &el), "15.9px");
        assert_eq!(adjust_value("font-size", "12.7px", ElementKind::Other, &el), "11.9px");
        assert_eq!(adjust_value("font-size", "1em", ElementKind::Other, &el), "1em");
    }

    #[test]
    fn inline_iframes_become_blocks() {
        let el = ClonedElement::new("iframe");
        assert_eq!(adjust_value("display", "inline", ElementKind::Iframe, &el), "block");
        assert_eq!(adjust_value("display", "inline", ElementKind::Other, &el), "inline");
    }

    #[test]
    fn svg_paths_carry_d_attribute() {
        let mut el = ClonedElement::new("path");
        el.set_attr("d", "M0 0L1 1");
        assert_eq!(adjust_value("d", "none", ElementKind::Other, &el), "path(\"M0 0L1 1\")");
    }

    #[test]
    fn overrides_apply_to_root() {
        let mut root = ClonedElement::new("div");
        root.style.set("width", "10px");
        let options = CaptureOptions::default()
            .with_size(200.0, 100.0)
            .with_style("backgroundColor", "red")
            .with_style("transform", "scale(0.5)");
        apply_style(&mut root, &options);
        assert_eq!(root.style.get("width"), Some("200px"));
        assert_eq!(root.style.get("height"), Some("100px"));
        assert_eq!(root.style.get("background-color"), Some("red"));
        assert_eq!(root.style.get("transform"), Some("scale(0.5)"));
    }

    #[test]
    fn use_references_are_collected_once() {
        let mut svg = ClonedElement::new("svg");
        for href in ["#icon", "#icon", "other.svg#x", "#"] {
            let mut el = ClonedElement::new("use");
            el.set_attr("href", href);
            svg.children.push(ClonedNode::Element(el));
        }
        let mut legacy = ClonedElement::new("use");
        legacy.set_attr("xlink:href", "#arrow");
        svg.children.push(ClonedNode::Element(legacy));

        let mut ids = Vec::new();
        use_references(&svg, &mut ids);
        assert_eq!(ids, vec!["icon", "arrow"]);
        assert!(!contains_id(&svg, "icon"));
    }

    #[test]
    fn attribute_helpers_are_case_insensitive() {
        let mut el = ClonedElement::new("img");
        el.set_attr("SRC", "a.png");
        el.set_attr("src", "b.png");
        assert_eq!(el.attributes.len(), 1);
        assert_eq!(el.attr("src"), Some("b.png"));
        el.remove_attr("Src");
        assert!(el.attributes.is_empty());
    }
}
