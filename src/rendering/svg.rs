//! Vector document serializer
//!
//! Wraps a cloned tree in an SVG `<foreignObject>` sized to the capture,
//! with the aggregated CSS in a `<style>` block and an optional background
//! rectangle underneath everything.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::clone::{ClonedElement, ClonedNode, Namespace};

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Characters left alone by JavaScript's `encodeURIComponent`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

/// A serialized capture ready to be decoded as an image
#[derive(Debug, Clone, PartialEq)]
pub struct VectorDocument {
    markup: String,
    width: f64,
    height: f64,
}

impl VectorDocument {
    pub fn new(
        root: &ClonedElement,
        css: Option<&str>,
        width: f64,
        height: f64,
        background: Option<&str>,
    ) -> Self {
        let mut markup = String::with_capacity(1024);
        markup.push_str(&format!(
            "<svg xmlns=\"{SVG_NS}\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">"
        ));
        if let Some(color) = background.filter(|c| !c.is_empty()) {
            markup.push_str(&format!(
                "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
                escape_xml(color)
            ));
        }
        if let Some(css) = css.filter(|c| !c.trim().is_empty()) {
            markup.push_str("<style>");
            markup.push_str(&escape_xml(css));
            markup.push_str("</style>");
        }
        markup.push_str(
            "<foreignObject x=\"0\" y=\"0\" width=\"100%\" height=\"100%\" externalResourcesRequired=\"true\">",
        );
        write_element(&mut markup, root, None);
        markup.push_str("</foreignObject></svg>");
        Self { markup, width, height }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn to_markup(&self) -> &str {
        &self.markup
    }

    /// `data:image/svg+xml;charset=utf-8,` URI with the markup percent-encoded
    pub fn to_data_url(&self) -> String {
        format!(
            "data:image/svg+xml;charset=utf-8,{}",
            utf8_percent_encode(&self.markup, URI_COMPONENT)
        )
    }
}

fn write_element(out: &mut String, el: &ClonedElement, parent: Option<Namespace>) {
    out.push('<');
    out.push_str(&el.tag);

    // Namespace roots declare their namespace; inherited declarations are implied.
    if parent != Some(el.namespace) {
        match el.namespace {
            Namespace::Html => push_attr(out, "xmlns", XHTML_NS),
            Namespace::Svg => {
                push_attr(out, "xmlns", SVG_NS);
                push_attr(out, "xmlns:xlink", XLINK_NS);
            }
        }
    }

    for (name, value) in &el.attributes {
        let lower = name.to_ascii_lowercase();
        if lower == "style" || lower == "xmlns" || lower.starts_with("xmlns:") || !is_xml_name(name) {
            continue;
        }
        push_attr(out, name, value);
    }
    if !el.style.is_empty() {
        let css: Vec<String> = el.style.iter().map(|(k, v)| format!("{}: {};", k, v)).collect();
        push_attr(out, "style", &css.join(" "));
    }

    let is_void = el.namespace == Namespace::Html && VOID_ELEMENTS.contains(&el.tag.to_ascii_lowercase().as_str());
    if el.children.is_empty() || is_void {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &el.children {
        match child {
            ClonedNode::Element(child) => write_element(out, child, Some(el.namespace)),
            ClonedNode::Text(text) => out.push_str(&escape_xml(text)),
        }
    }
    out.push_str("</");
    out.push_str(&el.tag);
    out.push('>');
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape_xml(value));
    out.push('"');
}

pub fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Whether `name` can appear as an XML attribute name.
pub fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == ':')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}
