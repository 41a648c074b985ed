//! domsnap
//!
//! Capture a rendered DOM subtree as a self-contained image. The pipeline
//! clones the subtree with its computed styles, inlines every external
//! resource as `data:` URIs, wraps the result in an SVG `<foreignObject>` and
//! optionally rasterizes it to PNG, JPEG or raw RGBA pixels.
//!
//! # Features
//!
//! - **http** (default): [`resource::HttpFetcher`] over `reqwest`
//! - **static-host** (default): [`dom::StaticDocument`], a host over parsed HTML
//! - **resvg**: [`rendering::ResvgDecoder`] for rasterizing without a browser
//!
//! # Example
//!
//! ```no_run
//! use domsnap::dom::StaticDocument;
//! use domsnap::{CaptureOptions, Capturer};
//!
//! # async fn run() -> domsnap::Result<()> {
//! let doc = StaticDocument::parse(r#"<div id="card" style="width: 200px">Hello</div>"#);
//! let card = doc.select("#card")?.expect("card exists");
//!
//! let capturer = Capturer::default();
//! let svg = capturer
//!     .to_svg(&doc, &card, &CaptureOptions::default().with_size(200.0, 100.0))
//!     .await?;
//! assert!(svg.starts_with("data:image/svg+xml;charset=utf-8,"));
//! # Ok(())
//! # }
//! ```

use log::debug;
use std::sync::Arc;

pub mod clone;
pub mod dom;
pub mod error;
pub mod options;
pub mod rendering;
pub mod resource;

pub use error::{Error, Result};
pub use options::{CaptureOptions, FilterNode, OutputFormat};
pub use rendering::{Blob, ImageDecoder, Surface, VectorDocument};
pub use resource::{FetchedResource, ResourceFetcher};

use clone::{apply_style, clone_node};
use dom::{HostDocument, LiveNode};
use rendering::{rasterize, RasterRequest};
use resource::fonts::font_embed_css;
use resource::images::embed_images;
use resource::EmbedContext;

/// Configuration shared by every capture of a [`Capturer`]
///
/// # Examples
///
/// ```
/// let cfg = domsnap::CapturerConfig::default();
/// assert_eq!(cfg.device_pixel_ratio, 1.0);
/// assert!(cfg.fetch_concurrency > 0);
/// ```
#[derive(Debug, Clone)]
pub struct CapturerConfig {
    /// Pixel ratio used when the options do not set one
    pub device_pixel_ratio: f64,
    /// Maximum number of resource fetches in flight per capture
    pub fetch_concurrency: usize,
}

impl Default for CapturerConfig {
    fn default() -> Self {
        Self {
            device_pixel_ratio: 1.0,
            fetch_concurrency: num_cpus::get() * 4,
        }
    }
}

/// Entry point of the capture pipeline
///
/// Holds the injected collaborators: the resource fetcher every embedding
/// goes through and, for raster outputs, the decoder that turns a vector
/// document into pixels.
#[derive(Clone)]
pub struct Capturer {
    fetcher: Arc<dyn ResourceFetcher>,
    decoder: Option<Arc<dyn ImageDecoder>>,
    config: CapturerConfig,
}

impl Capturer {
    pub fn new(fetcher: impl ResourceFetcher + 'static) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            decoder: None,
            config: CapturerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CapturerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_decoder(mut self, decoder: impl ImageDecoder + 'static) -> Self {
        self.decoder = Some(Arc::new(decoder));
        self
    }

    pub fn config(&self) -> &CapturerConfig {
        &self.config
    }

    /// Clone, embed and serialize `node` into a vector document.
    pub async fn to_vector_document<D, N>(
        &self,
        document: &D,
        node: &N,
        options: &CaptureOptions,
    ) -> Result<VectorDocument>
    where
        D: HostDocument,
        N: LiveNode,
    {
        let tree = clone_node(node, options).await?;
        let mut root = tree.root;
        let width = options.width.unwrap_or(tree.width);
        let height = options.height.unwrap_or(tree.height);

        let ctx = EmbedContext::new(Arc::clone(&self.fetcher), options)
            .with_base_url(document.base_url())
            .with_fetch_limit(self.config.fetch_concurrency);
        // Overrides first, so override fonts and images are embedded too.
        apply_style(&mut root, options);
        let css = font_embed_css(document, &root, &ctx).await?;
        embed_images(&mut root, &ctx).await?;
        debug!(
            "serializing {}x{} capture, {} resource(s) fetched",
            width,
            height,
            ctx.cache().fetch_count()
        );

        Ok(VectorDocument::new(
            &root,
            css.as_deref(),
            width,
            height,
            options.background_color.as_deref(),
        ))
    }

    /// `data:image/svg+xml` URI of the capture
    pub async fn to_svg<D: HostDocument, N: LiveNode>(
        &self,
        document: &D,
        node: &N,
        options: &CaptureOptions,
    ) -> Result<String> {
        Ok(self.to_vector_document(document, node, options).await?.to_data_url())
    }

    /// Rasterize the capture onto a pixel surface.
    pub async fn to_surface<D: HostDocument, N: LiveNode>(
        &self,
        document: &D,
        node: &N,
        options: &CaptureOptions,
    ) -> Result<Surface> {
        let decoder = self
            .decoder
            .as_deref()
            .ok_or_else(|| Error::ConfigError("raster output needs an image decoder".into()))?;
        let doc = self.to_vector_document(document, node, options).await?;
        let request = RasterRequest::from_options(doc.width(), doc.height(), options, self.config.device_pixel_ratio);
        rasterize(decoder, &doc.to_data_url(), &request).await
    }

    /// `data:image/png;base64` URI of the capture
    pub async fn to_png<D: HostDocument, N: LiveNode>(
        &self,
        document: &D,
        node: &N,
        options: &CaptureOptions,
    ) -> Result<String> {
        self.to_surface(document, node, options).await?.to_png_data_url()
    }

    /// `data:image/jpeg;base64` URI of the capture at the options' quality
    pub async fn to_jpeg<D: HostDocument, N: LiveNode>(
        &self,
        document: &D,
        node: &N,
        options: &CaptureOptions,
    ) -> Result<String> {
        self.to_surface(document, node, options)
            .await?
            .to_jpeg_data_url(options.jpeg_quality())
    }

    /// Encoded bytes in `options.blob_format`
    pub async fn to_blob<D: HostDocument, N: LiveNode>(
        &self,
        document: &D,
        node: &N,
        options: &CaptureOptions,
    ) -> Result<Blob> {
        self.to_surface(document, node, options)
            .await?
            .to_blob(options.blob_format, options.jpeg_quality())
    }

    /// Row-major RGBA bytes of the whole surface
    pub async fn to_pixel_data<D: HostDocument, N: LiveNode>(
        &self,
        document: &D,
        node: &N,
        options: &CaptureOptions,
    ) -> Result<Vec<u8>> {
        Ok(self.to_surface(document, node, options).await?.to_pixel_data())
    }
}

#[cfg(feature = "http")]
impl Default for Capturer {
    fn default() -> Self {
        Self::new(resource::HttpFetcher::new())
    }
}

impl std::fmt::Debug for Capturer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capturer")
            .field("has_decoder", &self.decoder.is_some())
            .field("config", &self.config)
            .finish()
    }
}
