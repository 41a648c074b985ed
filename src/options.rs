//! Per-capture options
//!
//! `CaptureOptions` is built once per capture and only ever borrowed
//! immutably by the pipeline stages. The plain-data fields deserialize from
//! JSON using the camelCase option names (`backgroundColor`, `fontEmbedCSS`,
//! `type`, ...); the two callbacks can only be set from code.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::resource::FetchFailure;

/// Predicate deciding whether a (non-root) node and its subtree are cloned.
pub type NodeFilter = Arc<dyn Fn(&FilterNode<'_>) -> bool + Send + Sync>;

/// Invoked when an image or other resource fails to load.
pub type ImageErrorHandler = Arc<dyn Fn(&FetchFailure) + Send + Sync>;

/// Read-only view of a live node handed to a [`NodeFilter`].
#[derive(Debug, Clone, Copy)]
pub struct FilterNode<'a> {
    /// Lowercase tag name, `None` for text nodes
    pub tag: Option<&'a str>,
    /// Element attributes in document order (empty for text nodes)
    pub attributes: &'a [(String, String)],
    /// Text content for text nodes
    pub text: Option<&'a str>,
}

impl<'a> FilterNode<'a> {
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn is_element(&self) -> bool {
        self.tag.is_some()
    }
}

/// Encoded raster formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum OutputFormat {
    #[default]
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Configuration for a single capture
///
/// # Examples
///
/// ```
/// let opts: domsnap::CaptureOptions =
///     serde_json::from_str(r##"{ "width": 200, "backgroundColor": "#fff" }"##).unwrap();
/// assert_eq!(opts.width, Some(200.0));
/// assert_eq!(opts.background_color.as_deref(), Some("#fff"));
/// ```
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureOptions {
    /// Width of the output in CSS pixels (defaults to the node's natural width)
    pub width: Option<f64>,
    /// Height of the output in CSS pixels (defaults to the node's natural height)
    pub height: Option<f64>,
    /// Style overrides applied to the cloned root; camelCase names are accepted
    pub style: BTreeMap<String, String>,
    /// When set, only these computed style properties are cloned
    pub include_style_properties: Option<Vec<String>>,
    /// Fill color painted beneath all content
    pub background_color: Option<String>,
    /// Node filter; never applied to the root
    #[serde(skip)]
    pub filter: Option<NodeFilter>,
    /// Append a uniqueness token to every fetched URL
    pub cache_bust: bool,
    /// Keep query strings in resource cache keys
    pub include_query_params: bool,
    /// Device pixel ratio override
    pub pixel_ratio: Option<f64>,
    /// JPEG quality in [0, 1]
    pub quality: Option<f64>,
    /// Pre-embedded font CSS used verbatim instead of font discovery
    #[serde(rename = "fontEmbedCSS")]
    pub font_embed_css: Option<String>,
    /// Keep only `@font-face` sources with this `format()`
    pub preferred_font_format: Option<String>,
    /// Skip web font discovery entirely
    pub skip_fonts: bool,
    /// Data URI substituted for resources that fail to load
    pub image_placeholder: Option<String>,
    /// Raster surface width override (CSS pixels)
    pub canvas_width: Option<f64>,
    /// Raster surface height override (CSS pixels)
    pub canvas_height: Option<f64>,
    /// Do not clamp oversized raster surfaces
    pub skip_auto_scale: bool,
    /// Format produced by blob captures
    #[serde(rename = "type")]
    pub blob_format: OutputFormat,
    /// Called for every resource that fails to load
    #[serde(skip)]
    pub on_image_error_handler: Option<ImageErrorHandler>,
}

impl CaptureOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.style.insert(property.into(), value.into());
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&FilterNode<'_>) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_image_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&FetchFailure) + Send + Sync + 'static,
    {
        self.on_image_error_handler = Some(Arc::new(handler));
        self
    }

    /// Whether `property` survives the style allowlist.
    pub(crate) fn keeps_property(&self, property: &str) -> bool {
        match &self.include_style_properties {
            Some(allow) => allow
                .iter()
                .any(|p| p == property || kebab_case(p) == property),
            None => true,
        }
    }

    /// JPEG quality clamped to [0, 1], defaulting to 1.
    pub fn jpeg_quality(&self) -> f64 {
        self.quality.unwrap_or(1.0).clamp(0.0, 1.0)
    }
}

impl fmt::Debug for CaptureOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureOptions")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("style", &self.style)
            .field("include_style_properties", &self.include_style_properties)
            .field("background_color", &self.background_color)
            .field("filter", &self.filter.as_ref().map(|_| "<fn>"))
            .field("cache_bust", &self.cache_bust)
            .field("include_query_params", &self.include_query_params)
            .field("pixel_ratio", &self.pixel_ratio)
            .field("quality", &self.quality)
            .field("font_embed_css", &self.font_embed_css)
            .field("preferred_font_format", &self.preferred_font_format)
            .field("skip_fonts", &self.skip_fonts)
            .field("image_placeholder", &self.image_placeholder)
            .field("canvas_width", &self.canvas_width)
            .field("canvas_height", &self.canvas_height)
            .field("skip_auto_scale", &self.skip_auto_scale)
            .field("blob_format", &self.blob_format)
            .field(
                "on_image_error_handler",
                &self.on_image_error_handler.as_ref().map(|_| "<fn>"),
            )
            .finish()
    }
}

/// `backgroundColor` -> `background-color`; kebab-case input is returned as-is.
pub fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    // WebkitMask -> -webkit-mask
    if ["webkit-", "moz-", "ms-"].iter().any(|p| out.starts_with(p))
        && name.starts_with(|c: char| c.is_ascii_uppercase())
    {
        out.insert(0, '-');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_properties_are_normalized() {
        assert_eq!(kebab_case("backgroundColor"), "background-color");
        assert_eq!(kebab_case("transform-origin"), "transform-origin");
        assert_eq!(kebab_case("WebkitMaskImage"), "-webkit-mask-image");
        assert_eq!(kebab_case("width"), "width");
    }

    #[test]
    fn allowlist_accepts_both_spellings() {
        let opts = CaptureOptions {
            include_style_properties: Some(vec!["width".into(), "backgroundColor".into()]),
            ..Default::default()
        };
        assert!(opts.keeps_property("width"));
        assert!(opts.keeps_property("background-color"));
        assert!(!opts.keeps_property("height"));
        assert!(CaptureOptions::default().keeps_property("height"));
    }

    #[test]
    fn options_deserialize_from_public_names() {
        let opts: CaptureOptions = serde_json::from_str(
            r#"{
                "width": 200,
                "height": 100,
                "style": { "transform": "scale(2)" },
                "includeStyleProperties": ["width"],
                "cacheBust": true,
                "pixelRatio": 2,
                "quality": 0.5,
                "fontEmbedCSS": "@font-face {}",
                "preferredFontFormat": "woff2",
                "type": "image/jpeg"
            }"#,
        )
        .unwrap();
        assert_eq!(opts.height, Some(100.0));
        assert_eq!(opts.style.get("transform").map(String::as_str), Some("scale(2)"));
        assert!(opts.cache_bust);
        assert_eq!(opts.pixel_ratio, Some(2.0));
        assert_eq!(opts.font_embed_css.as_deref(), Some("@font-face {}"));
        assert_eq!(opts.blob_format, OutputFormat::Jpeg);
        assert!(opts.filter.is_none());
    }

    #[test]
    fn jpeg_quality_defaults_to_one() {
        assert_eq!(CaptureOptions::default().jpeg_quality(), 1.0);
        let opts = CaptureOptions { quality: Some(3.0), ..Default::default() };
        assert_eq!(opts.jpeg_quality(), 1.0);
    }

    #[test]
    fn filter_node_reads_classes() {
        let attrs = vec![("class".to_string(), "a omit b".to_string())];
        let node = FilterNode { tag: Some("div"), attributes: &attrs, text: None };
        assert!(node.has_class("omit"));
        assert!(!node.has_class("om"));
        assert!(node.is_element());
    }
}
