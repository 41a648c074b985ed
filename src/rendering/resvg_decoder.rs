//! `resvg`-backed [`ImageDecoder`]
//!
//! Renders the SVG parts of a vector document (background, SVG content).
//! `foreignObject` HTML is not rendered; that needs a browser host.

use futures::future::{BoxFuture, FutureExt};
use image::RgbaImage;
use resvg::{tiny_skia, usvg};
use std::sync::Arc;

use super::ImageDecoder;
use crate::resource::decode_data_url;
use crate::{Error, Result};

#[derive(Clone)]
pub struct ResvgDecoder {
    options: Arc<usvg::Options<'static>>,
}

impl ResvgDecoder {
    pub fn new() -> Self {
        Self::with_options(usvg::Options::default())
    }

    /// Decoder with the system fonts loaded for SVG `<text>`.
    pub fn with_system_fonts() -> Self {
        let mut options = usvg::Options::default();
        options.fontdb_mut().load_system_fonts();
        Self::with_options(options)
    }

    pub fn with_options(options: usvg::Options<'static>) -> Self {
        Self {
            options: Arc::new(options),
        }
    }
}

impl Default for ResvgDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageDecoder for ResvgDecoder {
    fn decode<'a>(&'a self, uri: &'a str, width: u32, height: u32) -> BoxFuture<'a, Result<RgbaImage>> {
        let options = Arc::clone(&self.options);
        let uri = uri.to_string();
        async move {
            tokio::task::spawn_blocking(move || render(&uri, width, height, &options))
                .await
                .map_err(|e| Error::DecodeError(format!("render task failed: {}", e)))?
        }
        .boxed()
    }
}

fn render(uri: &str, width: u32, height: u32, options: &usvg::Options<'static>) -> Result<RgbaImage> {
    let svg = decode_data_url(uri)
        .and_then(|res| res.to_text())
        .map_err(|e| Error::DecodeError(e.to_string()))?;
    let tree = usvg::Tree::from_str(&svg, options).map_err(|e| Error::DecodeError(e.to_string()))?;

    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| Error::DecodeError(format!("cannot allocate {}x{} pixmap", width, height)))?;
    let size = tree.size();
    let transform = tiny_skia::Transform::from_scale(width as f32 / size.width(), height as f32 / size.height());
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    RgbaImage::from_raw(width, height, data)
        .ok_or_else(|| Error::DecodeError("pixel buffer size mismatch".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clone::ClonedElement;
    use crate::rendering::VectorDocument;

    #[tokio::test]
    async fn renders_background_rect() {
        let doc = VectorDocument::new(&ClonedElement::new("div"), None, 4.0, 2.0, Some("#ff0000"));
        let img = ResvgDecoder::new().decode(&doc.to_data_url(), 8, 4).await.unwrap();
        assert_eq!(img.dimensions(), (8, 4));
        assert_eq!(img.get_pixel(3, 2).0, [255, 0, 0, 255]);
    }

    #[tokio::test]
    async fn garbage_is_a_decode_error() {
        let err = ResvgDecoder::new().decode("data:image/svg+xml,<nope", 1, 1).await.unwrap_err();
        assert!(matches!(err, Error::DecodeError(_)));
    }
}
