//! Static HTML host
//!
//! A [`HostDocument`]/[`LiveNode`] implementation over parsed HTML, for
//! capturing markup without a browser. Styles come from a small cascade:
//! built-in display defaults, `<style>` blocks and extra stylesheets in
//! source order, then inline `style` attributes. Selector specificity is not
//! considered and lengths are used as authored.

use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::css::{parse_declarations, parse_stylesheet, split_top_level, CssRule, Declaration};
use super::{ComputedStyle, HostDocument, LiveNode, NodeType, PseudoElement, StyleSheetSource};
use crate::resource::resolve_url;
use crate::{Error, Result};

/// Viewport dimensions used when an element has no authored size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

const INHERITED: &[&str] = &[
    "color",
    "font-family",
    "font-size",
    "font-style",
    "font-weight",
    "letter-spacing",
    "line-height",
    "text-align",
    "text-transform",
    "visibility",
    "white-space",
    "word-spacing",
];

const HIDDEN: &[&str] = &["head", "script", "style", "title", "meta", "link", "template", "base", "noscript"];

const BLOCKS: &[&str] = &[
    "html", "body", "div", "p", "section", "article", "header", "footer", "main", "nav", "aside", "form",
    "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "dl", "dd", "dt", "pre", "blockquote", "figure",
    "figcaption", "fieldset", "hr", "address",
];

fn default_display(tag: &str) -> &'static str {
    match tag {
        t if HIDDEN.contains(&t) => "none",
        t if BLOCKS.contains(&t) => "block",
        "li" => "list-item",
        "table" => "table",
        "tr" => "table-row",
        "td" | "th" => "table-cell",
        "img" | "canvas" | "video" | "input" | "select" | "textarea" | "button" | "iframe" => "inline-block",
        _ => "inline",
    }
}

#[derive(Debug)]
enum NodeData {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    Other,
}

#[derive(Debug, Default)]
struct Styles {
    element: ComputedStyle,
    before: ComputedStyle,
    after: ComputedStyle,
}

#[derive(Debug, Default, Clone)]
struct LiveState {
    value: Option<String>,
    checked: Option<bool>,
    canvas: Option<String>,
    video_frame: Option<String>,
}

#[derive(Debug)]
struct Tree {
    source: String,
    nodes: Vec<NodeData>,
    children: Vec<Vec<usize>>,
    styles: Vec<Option<Styles>>,
    state: RwLock<HashMap<usize, LiveState>>,
    sheets: Vec<StyleSheetSource>,
    base_url: Option<String>,
    viewport: Viewport,
}

/// A parsed HTML document with resolved styles
#[derive(Debug, Clone)]
pub struct StaticDocument {
    tree: Arc<Tree>,
}

/// Builder for [`StaticDocument`]
#[derive(Debug, Clone, Default)]
pub struct StaticDocumentBuilder {
    html: String,
    base_url: Option<String>,
    viewport: Viewport,
    stylesheets: Vec<String>,
}

impl StaticDocumentBuilder {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Add a stylesheet applied after the document's own `<style>` blocks.
    pub fn with_stylesheet(mut self, css: impl Into<String>) -> Self {
        self.stylesheets.push(css.into());
        self
    }

    pub fn build(self) -> StaticDocument {
        let document = Html::parse_document(&self.html);
        let order: Vec<_> = document.tree.root().descendants().collect();
        let index: HashMap<_, _> = order.iter().enumerate().map(|(i, n)| (n.id(), i)).collect();

        let mut nodes = Vec::with_capacity(order.len());
        let mut children = Vec::with_capacity(order.len());
        let mut parents = Vec::with_capacity(order.len());
        for node in &order {
            nodes.push(match node.value() {
                Node::Element(el) => NodeData::Element {
                    tag: el.name().to_string(),
                    attributes: el
                        .attrs
                        .iter()
                        .map(|(name, value)| {
                            let local: &str = &name.local;
                            let key = match &name.prefix {
                                Some(prefix) => format!("{}:{}", &**prefix, local),
                                None => local.to_string(),
                            };
                            (key, value.to_string())
                        })
                        .collect(),
                },
                Node::Text(text) => NodeData::Text((&**text).to_string()),
                _ => NodeData::Other,
            });
            children.push(node.children().filter_map(|c| index.get(&c.id()).copied()).collect::<Vec<_>>());
            parents.push(node.parent().and_then(|p| index.get(&p.id()).copied()));
        }

        let base_url = self.base_url.or_else(|| {
            nodes.iter().find_map(|n| match n {
                NodeData::Element { tag, attributes } if tag == "base" => {
                    attributes.iter().find(|(k, _)| k == "href").map(|(_, v)| v.clone())
                }
                _ => None,
            })
        });

        let mut sheets = Vec::new();
        for (i, node) in nodes.iter().enumerate() {
            let NodeData::Element { tag, attributes } = node else {
                continue;
            };
            let attr = |name: &str| attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str());
            match tag.as_str() {
                "style" => {
                    let text: String = children[i]
                        .iter()
                        .filter_map(|c| match &nodes[*c] {
                            NodeData::Text(t) => Some(t.as_str()),
                            _ => None,
                        })
                        .collect();
                    sheets.push(StyleSheetSource::inline(text));
                }
                "link" if attr("rel").map_or(false, |r| r.eq_ignore_ascii_case("stylesheet")) => {
                    if let Some(href) = attr("href") {
                        sheets.push(StyleSheetSource::linked(resolve_url(href, base_url.as_deref())));
                    }
                }
                _ => {}
            }
        }
        sheets.extend(self.stylesheets.iter().map(|css| StyleSheetSource::inline(css.as_str())));

        let rules = compile_rules(&sheets);
        let mut styles: Vec<Option<Styles>> = Vec::with_capacity(order.len());
        for (i, node) in order.iter().enumerate() {
            let resolved = match (ElementRef::wrap(*node), &nodes[i]) {
                (Some(el), NodeData::Element { tag, attributes }) => {
                    let parent = parents[i].and_then(|p| styles[p].as_ref()).map(|s| &s.element);
                    Some(cascade(&el, tag, attributes, parent, &rules))
                }
                _ => None,
            };
            styles.push(resolved);
        }

        StaticDocument {
            tree: Arc::new(Tree {
                source: self.html,
                nodes,
                children,
                styles,
                state: RwLock::new(HashMap::new()),
                sheets,
                base_url,
                viewport: self.viewport,
            }),
        }
    }
}

struct CompiledRule {
    selector: Selector,
    pseudo: Option<PseudoElement>,
    declarations: Vec<Declaration>,
}

fn compile_rules(sheets: &[StyleSheetSource]) -> Vec<CompiledRule> {
    let mut compiled = Vec::new();
    for sheet in sheets {
        let Some(text) = &sheet.css_text else {
            continue;
        };
        let mut stack = parse_stylesheet(text);
        stack.reverse();
        while let Some(rule) = stack.pop() {
            match rule {
                CssRule::Style { selectors, declarations } => {
                    for selector in split_top_level(&selectors, b',') {
                        let (selector, pseudo) = split_pseudo(selector.trim());
                        match Selector::parse(selector) {
                            Ok(selector) => compiled.push(CompiledRule {
                                selector,
                                pseudo,
                                declarations: declarations.clone(),
                            }),
                            Err(_) => log::debug!("skipping unsupported selector {:?}", selector),
                        }
                    }
                }
                CssRule::Group { rules, .. } => stack.extend(rules.into_iter().rev()),
                _ => {}
            }
        }
    }
    compiled
}

fn split_pseudo(selector: &str) -> (&str, Option<PseudoElement>) {
    for (suffix, pseudo) in [
        ("::before", PseudoElement::Before),
        (":before", PseudoElement::Before),
        ("::after", PseudoElement::After),
        (":after", PseudoElement::After),
    ] {
        if let Some(base) = selector.strip_suffix(suffix) {
            let base = if base.is_empty() { "*" } else { base };
            return (base, Some(pseudo));
        }
    }
    (selector, None)
}

fn cascade(
    el: &ElementRef<'_>,
    tag: &str,
    attributes: &[(String, String)],
    parent: Option<&ComputedStyle>,
    rules: &[CompiledRule],
) -> Styles {
    let mut styles = Styles::default();
    styles.element.set("display", default_display(tag));
    if let Some(parent) = parent {
        inherit(&mut styles.element, parent);
    }

    let matched: Vec<&CompiledRule> = rules.iter().filter(|r| r.selector.matches(el)).collect();
    let inline = attributes
        .iter()
        .find(|(k, _)| k == "style")
        .map(|(_, v)| parse_declarations(v))
        .unwrap_or_default();

    for important in [false, true] {
        for rule in matched.iter().filter(|r| r.pseudo.is_none()) {
            apply(&mut styles.element, &rule.declarations, important);
        }
        apply(&mut styles.element, &inline, important);
    }

    for (pseudo, target) in [(PseudoElement::Before, &mut styles.before), (PseudoElement::After, &mut styles.after)] {
        let mut pseudo_rules = matched.iter().filter(|r| r.pseudo == Some(pseudo)).peekable();
        if pseudo_rules.peek().is_none() {
            continue;
        }
        target.set("display", "inline");
        inherit(target, &styles.element);
        let pseudo_rules: Vec<_> = pseudo_rules.collect();
        for important in [false, true] {
            for rule in &pseudo_rules {
                apply(target, &rule.declarations, important);
            }
        }
    }
    styles
}

fn inherit(style: &mut ComputedStyle, parent: &ComputedStyle) {
    for name in INHERITED {
        if let Some(value) = parent.get(name) {
            style.set(*name, value);
        }
    }
}

fn apply(style: &mut ComputedStyle, declarations: &[Declaration], important: bool) {
    for decl in declarations.iter().filter(|d| d.important == important) {
        if decl.value.eq_ignore_ascii_case("inherit") {
            continue;
        }
        style.set(decl.name.as_str(), decl.value.as_str());
    }
}

impl StaticDocument {
    pub fn parse(html: &str) -> Self {
        Self::builder(html).build()
    }

    pub fn builder(html: impl Into<String>) -> StaticDocumentBuilder {
        StaticDocumentBuilder {
            html: html.into(),
            ..Default::default()
        }
    }

    /// The `<html>` element
    pub fn document_element(&self) -> Option<StaticNode> {
        self.tree
            .nodes
            .iter()
            .position(|n| matches!(n, NodeData::Element { .. }))
            .map(|id| self.node(id))
    }

    pub fn body(&self) -> Option<StaticNode> {
        self.select("body").ok().flatten()
    }

    /// First element matching a CSS selector, in document order.
    pub fn select(&self, selector: &str) -> Result<Option<StaticNode>> {
        let selector = Selector::parse(selector)
            .map_err(|e| Error::ConfigError(format!("invalid selector {:?}: {:?}", selector, e)))?;
        // Re-parsing yields the same pre-order numbering as the arena.
        let document = Html::parse_document(&self.tree.source);
        let found = document
            .tree
            .root()
            .descendants()
            .enumerate()
            .find(|(_, node)| ElementRef::wrap(*node).map_or(false, |el| selector.matches(&el)))
            .map(|(id, _)| self.node(id));
        Ok(found)
    }

    fn node(&self, id: usize) -> StaticNode {
        StaticNode {
            tree: Arc::clone(&self.tree),
            id,
        }
    }
}

impl HostDocument for StaticDocument {
    fn base_url(&self) -> Option<String> {
        self.tree.base_url.clone()
    }

    fn style_sheets(&self) -> Vec<StyleSheetSource> {
        self.tree.sheets.clone()
    }
}

/// A node of a [`StaticDocument`]
///
/// Form values, canvas bitmaps and video frames can be set to stand in for
/// state a browser would hold.
#[derive(Debug, Clone)]
pub struct StaticNode {
    tree: Arc<Tree>,
    id: usize,
}

impl StaticNode {
    fn data(&self) -> &NodeData {
        &self.tree.nodes[self.id]
    }

    fn attr(&self, name: &str) -> Option<String> {
        match self.data() {
            NodeData::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    fn state(&self) -> LiveState {
        self.tree
            .state
            .read()
            .map(|s| s.get(&self.id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut LiveState)) {
        if let Ok(mut state) = self.tree.state.write() {
            f(state.entry(self.id).or_default());
        }
    }

    pub fn set_value(&self, value: impl Into<String>) {
        let value = value.into();
        self.update(|s| s.value = Some(value));
    }

    pub fn set_checked(&self, checked: bool) {
        self.update(|s| s.checked = Some(checked));
    }

    pub fn set_canvas_bitmap(&self, data_url: impl Into<String>) {
        let data_url = data_url.into();
        self.update(|s| s.canvas = Some(data_url));
    }

    pub fn set_video_frame(&self, data_url: impl Into<String>) {
        let data_url = data_url.into();
        self.update(|s| s.video_frame = Some(data_url));
    }

    fn text_content(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![self.id];
        while let Some(id) = stack.pop() {
            if let NodeData::Text(t) = &self.tree.nodes[id] {
                out.push_str(t);
            }
            stack.extend(self.tree.children[id].iter().rev());
        }
        out
    }

    fn descendant_elements(&self, tag: &str) -> Vec<StaticNode> {
        let mut found = Vec::new();
        let mut stack: Vec<usize> = self.tree.children[self.id].iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if matches!(&self.tree.nodes[id], NodeData::Element { tag: t, .. } if t == tag) {
                found.push(StaticNode { tree: Arc::clone(&self.tree), id });
            }
            stack.extend(self.tree.children[id].iter().rev());
        }
        found
    }

    fn authored_px(&self, property: &str) -> Option<f64> {
        let style = &self.tree.styles[self.id].as_ref()?.element;
        style.get(property)?.trim().strip_suffix("px")?.trim().parse().ok()
    }
}

impl LiveNode for StaticNode {
    fn node_type(&self) -> NodeType {
        match self.data() {
            NodeData::Element { .. } => NodeType::Element,
            NodeData::Text(_) => NodeType::Text,
            NodeData::Other => NodeType::Other,
        }
    }

    fn tag_name(&self) -> String {
        match self.data() {
            NodeData::Element { tag, .. } => tag.clone(),
            _ => String::new(),
        }
    }

    fn text(&self) -> Option<String> {
        match self.data() {
            NodeData::Text(t) => Some(t.clone()),
            _ => None,
        }
    }

    fn attributes(&self) -> Vec<(String, String)> {
        match self.data() {
            NodeData::Element { attributes, .. } => attributes.clone(),
            _ => Vec::new(),
        }
    }

    fn children(&self) -> Vec<Self> {
        self.tree.children[self.id]
            .iter()
            .map(|&id| StaticNode { tree: Arc::clone(&self.tree), id })
            .collect()
    }

    fn computed_style(&self, pseudo: Option<PseudoElement>) -> Result<ComputedStyle> {
        let styles = self.tree.styles[self.id]
            .as_ref()
            .ok_or_else(|| Error::StyleCaptureError("node has no computed style".into()))?;
        Ok(match pseudo {
            None => styles.element.clone(),
            Some(PseudoElement::Before) => styles.before.clone(),
            Some(PseudoElement::After) => styles.after.clone(),
        })
    }

    fn scroll_size(&self) -> (f64, f64) {
        let viewport = self.tree.viewport;
        (
            self.authored_px("width").unwrap_or(viewport.width as f64),
            self.authored_px("height").unwrap_or(viewport.height as f64),
        )
    }

    fn canvas_data_url(&self) -> Option<String> {
        self.state().canvas
    }

    fn element_by_id(&self, id: &str) -> Option<Self> {
        self.tree
            .nodes
            .iter()
            .position(|node| match node {
                NodeData::Element { attributes, .. } => attributes.iter().any(|(k, v)| k == "id" && v == id),
                _ => false,
            })
            .map(|found| StaticNode { tree: Arc::clone(&self.tree), id: found })
    }

    fn video_frame_data_url(&self) -> Option<String> {
        self.state().video_frame
    }

    fn form_value(&self) -> Option<String> {
        if let Some(value) = self.state().value {
            return Some(value);
        }
        match self.tag_name().as_str() {
            "input" => self.attr("value"),
            "textarea" => Some(self.text_content()),
            "select" => {
                let options = self.descendant_elements("option");
                let chosen = options
                    .iter()
                    .find(|o| o.attr("selected").is_some())
                    .or_else(|| options.first())?;
                Some(chosen.attr("value").unwrap_or_else(|| chosen.text_content().trim().to_string()))
            }
            _ => None,
        }
    }

    fn is_checked(&self) -> Option<bool> {
        if self.tag_name() != "input" {
            return None;
        }
        let kind = self.attr("type").unwrap_or_default().to_ascii_lowercase();
        if kind != "checkbox" && kind != "radio" {
            return None;
        }
        Some(self.state().checked.unwrap_or_else(|| self.attr("checked").is_some()))
    }
}
