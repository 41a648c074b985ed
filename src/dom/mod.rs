//! Host document surface
//!
//! The capture pipeline never lays out or paints anything itself. It reads
//! the host's resolved state through the traits in this module: a
//! [`LiveNode`] for every node of the subtree being captured and a
//! [`HostDocument`] for document-wide state (base URL, stylesheets).
//!
//! Hosts are expected to flatten shadow roots and slotted content into
//! `LiveNode::children`.

pub mod css;

#[cfg(feature = "static-host")]
pub mod static_host;

#[cfg(feature = "static-host")]
pub use static_host::{StaticDocument, StaticNode, Viewport};

use futures::future::{self, BoxFuture, FutureExt};

use crate::Result;

/// Kind of node reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Element,
    Text,
    /// Comments, processing instructions and anything else that is not cloned
    Other,
}

/// Generated-content pseudo-elements that are materialized in the clone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoElement {
    Before,
    After,
}

impl PseudoElement {
    pub fn as_str(self) -> &'static str {
        match self {
            PseudoElement::Before => "::before",
            PseudoElement::After => "::after",
        }
    }
}

/// Element categories that need a state snapshot instead of a plain copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Canvas,
    Video,
    Image,
    SvgImage,
    Input,
    TextArea,
    Select,
    Iframe,
    Other,
}

impl ElementKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "canvas" => ElementKind::Canvas,
            "video" => ElementKind::Video,
            "img" => ElementKind::Image,
            "image" => ElementKind::SvgImage,
            "input" => ElementKind::Input,
            "textarea" => ElementKind::TextArea,
            "select" => ElementKind::Select,
            "iframe" => ElementKind::Iframe,
            _ => ElementKind::Other,
        }
    }
}

/// A resolved style declaration block: property names with their values,
/// in the order the host reports them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedStyle {
    properties: Vec<(String, String)>,
}

impl ComputedStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set a property, replacing an existing value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.properties.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.properties.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.properties.iter().position(|(k, _)| k == name)?;
        Some(self.properties.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ComputedStyle {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut style = ComputedStyle::new();
        for (k, v) in iter {
            style.set(k, v);
        }
        style
    }
}

/// A stylesheet attached to the host document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleSheetSource {
    /// Absolute URL of the sheet; also the base for its relative references
    pub href: Option<String>,
    /// Rule text when the host can read it; `None` means it must be fetched
    pub css_text: Option<String>,
}

impl StyleSheetSource {
    pub fn inline(css_text: impl Into<String>) -> Self {
        Self { href: None, css_text: Some(css_text.into()) }
    }

    pub fn linked(href: impl Into<String>) -> Self {
        Self { href: Some(href.into()), css_text: None }
    }
}

/// Document-wide state needed by the embedders
pub trait HostDocument: Send + Sync {
    /// Base URL relative references resolve against
    fn base_url(&self) -> Option<String>;

    /// Active stylesheets in document order
    fn style_sheets(&self) -> Vec<StyleSheetSource>;
}

/// A node of the live, rendered document.
///
/// Implementations are views into host state; the cloner copies everything
/// it needs out of them and never keeps a `LiveNode` past the capture.
pub trait LiveNode: Sized + Send + Sync {
    fn node_type(&self) -> NodeType;

    /// Tag name for elements (`div`, `foreignObject`), empty otherwise
    fn tag_name(&self) -> String;

    /// Character data of text nodes
    fn text(&self) -> Option<String>;

    /// Attributes in document order
    fn attributes(&self) -> Vec<(String, String)>;

    /// Child nodes in document order, shadow/slotted content flattened
    fn children(&self) -> Vec<Self>;

    /// Resolved style of the node or one of its pseudo-elements.
    ///
    /// Fails when the host cannot resolve style, e.g. for detached nodes.
    fn computed_style(&self, pseudo: Option<PseudoElement>) -> Result<ComputedStyle>;

    /// Natural content box size (scroll width, scroll height) in CSS pixels
    fn scroll_size(&self) -> (f64, f64);

    /// Resolves once images/videos have something to paint.
    fn ready(&self) -> BoxFuture<'_, ()> {
        future::ready(()).boxed()
    }

    /// Current canvas bitmap encoded as a data URI
    fn canvas_data_url(&self) -> Option<String> {
        None
    }

    /// Currently displayed video frame as a data URI, `None` before first paint
    fn video_frame_data_url(&self) -> Option<String> {
        None
    }

    /// Current value of an input, textarea or select
    fn form_value(&self) -> Option<String> {
        None
    }

    /// Current checkedness of checkbox/radio inputs
    fn is_checked(&self) -> Option<bool> {
        None
    }

    /// Element of the same document carrying `id`, wherever it sits.
    ///
    /// Used to copy SVG definitions that `<use>` references from outside
    /// the captured subtree. Hosts without id lookup leave them dangling.
    fn element_by_id(&self, _id: &str) -> Option<Self> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computed_style_set_replaces_in_place() {
        let mut style: ComputedStyle = [("color", "red"), ("width", "10px")].into_iter().collect();
        style.set("color", "blue");
        let pairs: Vec<_> = style.iter().collect();
        assert_eq!(pairs, vec![("color", "blue"), ("width", "10px")]);
        assert_eq!(style.remove("width").as_deref(), Some("10px"));
        assert_eq!(style.len(), 1);
    }

    #[test]
    fn element_kind_dispatch_is_case_insensitive() {
        assert_eq!(ElementKind::from_tag("CANVAS"), ElementKind::Canvas);
        assert_eq!(ElementKind::from_tag("textarea"), ElementKind::TextArea);
        assert_eq!(ElementKind::from_tag("div"), ElementKind::Other);
    }
}
