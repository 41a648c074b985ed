//! Rasterizer: decodes a vector document onto a pixel surface and encodes
//! the result.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage, RgbaImage};
use log::debug;
use std::io::Cursor;

use super::ImageDecoder;
use crate::options::OutputFormat;
use crate::{CaptureOptions, Error, Result};

/// Largest surface edge in device pixels before auto-scaling kicks in
pub const MAX_CANVAS_SIZE: u32 = 16384;

/// Size parameters of one raster capture
#[derive(Debug, Clone, PartialEq)]
pub struct RasterRequest {
    pub width: f64,
    pub height: f64,
    pub pixel_ratio: f64,
    pub canvas_width: Option<f64>,
    pub canvas_height: Option<f64>,
    pub skip_auto_scale: bool,
}

impl RasterRequest {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            pixel_ratio: 1.0,
            canvas_width: None,
            canvas_height: None,
            skip_auto_scale: false,
        }
    }

    /// Request for a capture of logical size `width × height`; the options'
    /// `pixel_ratio` wins over `default_ratio`.
    pub fn from_options(width: f64, height: f64, options: &CaptureOptions, default_ratio: f64) -> Self {
        Self {
            width,
            height,
            pixel_ratio: options.pixel_ratio.unwrap_or(default_ratio),
            canvas_width: options.canvas_width,
            canvas_height: options.canvas_height,
            skip_auto_scale: options.skip_auto_scale,
        }
    }

    /// Size in CSS pixels the surface represents; canvas overrides win
    pub fn logical_size(&self) -> (f64, f64) {
        (
            self.canvas_width.unwrap_or(self.width),
            self.canvas_height.unwrap_or(self.height),
        )
    }

    /// Device pixel size of the surface
    pub fn surface_size(&self) -> Result<(u32, u32)> {
        if !(self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0) {
            return Err(Error::ConfigError(format!("invalid pixel ratio {}", self.pixel_ratio)));
        }
        let (logical_width, logical_height) = self.logical_size();
        let mut width = (logical_width * self.pixel_ratio).round();
        let mut height = (logical_height * self.pixel_ratio).round();
        if !(width.is_finite() && height.is_finite()) || width < 1.0 || height < 1.0 {
            return Err(Error::ConfigError(format!(
                "surface size {}x{} is empty",
                width, height
            )));
        }

        let max = MAX_CANVAS_SIZE as f64;
        if !self.skip_auto_scale && (width > max || height > max) {
            if width >= height {
                height = (height * max / width).round().max(1.0);
                width = max;
            } else {
                width = (width * max / height).round().max(1.0);
                height = max;
            }
        }
        Ok((width as u32, height as u32))
    }
}

/// Decode `uri` and draw it onto a fresh surface.
pub async fn rasterize(decoder: &dyn ImageDecoder, uri: &str, request: &RasterRequest) -> Result<Surface> {
    let (width, height) = request.surface_size()?;
    debug!("rasterizing onto {}x{} surface", width, height);
    let bitmap = decoder.decode(uri, width, height).await.map_err(|e| match e {
        Error::DecodeError(_) => e,
        other => Error::DecodeError(other.to_string()),
    })?;

    let image = if bitmap.dimensions() == (width, height) {
        bitmap
    } else {
        imageops::resize(&bitmap, width, height, FilterType::Nearest)
    };
    let (logical_width, logical_height) = request.logical_size();
    Ok(Surface {
        image,
        logical_width,
        logical_height,
    })
}

/// An encoded image with its media type
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// RGBA pixels of a capture plus the logical size it represents
#[derive(Debug, Clone)]
pub struct Surface {
    image: RgbaImage,
    logical_width: f64,
    logical_height: f64,
}

impl Surface {
    /// Width in device pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in device pixels
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Size in CSS pixels, before the pixel ratio is applied
    pub fn logical_size(&self) -> (f64, f64) {
        (self.logical_width, self.logical_height)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Row-major RGBA bytes, four per pixel
    pub fn to_pixel_data(&self) -> Vec<u8> {
        self.image.as_raw().clone()
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| Error::EncodeError(format!("PNG: {}", e)))?;
        Ok(buffer)
    }

    pub fn to_png_data_url(&self) -> Result<String> {
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(self.to_png()?)))
    }

    /// JPEG with `quality` in [0, 1]; transparent pixels come out black.
    pub fn to_jpeg(&self, quality: f64) -> Result<Vec<u8>> {
        let rgb = RgbImage::from_fn(self.width(), self.height(), |x, y| {
            let [r, g, b, a] = self.image.get_pixel(x, y).0;
            let blend = |c: u8| ((c as u32 * a as u32 + 127) / 255) as u8;
            image::Rgb([blend(r), blend(g), blend(b)])
        });
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality(quality));
        rgb.write_with_encoder(encoder)
            .map_err(|e| Error::EncodeError(format!("JPEG: {}", e)))?;
        Ok(buffer)
    }

    pub fn to_jpeg_data_url(&self, quality: f64) -> Result<String> {
        Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(self.to_jpeg(quality)?)))
    }

    pub fn to_blob(&self, format: OutputFormat, quality: f64) -> Result<Blob> {
        let bytes = match format {
            OutputFormat::Png => self.to_png()?,
            OutputFormat::Jpeg => self.to_jpeg(quality)?,
        };
        Ok(Blob {
            mime_type: format.mime_type(),
            bytes,
        })
    }
}

fn jpeg_quality(quality: f64) -> u8 {
    let quality = if quality.is_finite() { quality.clamp(0.0, 1.0) } else { 1.0 };
    (quality * 100.0).round().max(1.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::{BoxFuture, FutureExt};

    struct Solid([u8; 4]);

    impl ImageDecoder for Solid {
        fn decode<'a>(&'a self, _uri: &'a str, width: u32, height: u32) -> BoxFuture<'a, Result<RgbaImage>> {
            // Half size, to exercise rescaling.
            let img = RgbaImage::from_pixel((width / 2).max(1), (height / 2).max(1), image::Rgba(self.0));
            async move { Ok(img) }.boxed()
        }
    }

    #[test]
    fn surface_size_applies_ratio_and_overrides() {
        let mut req = RasterRequest::new(200.0, 100.0);
        req.pixel_ratio = 2.0;
        assert_eq!(req.surface_size().unwrap(), (400, 200));
        req.canvas_width = Some(50.0);
        assert_eq!(req.surface_size().unwrap(), (100, 200));
    }

    #[test]
    fn oversized_surfaces_are_clamped_unless_disabled() {
        let mut req = RasterRequest::new(40000.0, 20000.0);
        assert_eq!(req.surface_size().unwrap(), (16384, 8192));
        req.skip_auto_scale = true;
        assert_eq!(req.surface_size().unwrap(), (40000, 20000));
    }

    #[test]
    fn empty_surfaces_are_rejected() {
        assert!(matches!(RasterRequest::new(0.0, 10.0).surface_size(), Err(Error::ConfigError(_))));
        let mut req = RasterRequest::new(10.0, 10.0);
        req.pixel_ratio = 0.0;
        assert!(req.surface_size().is_err());
    }

    #[tokio::test]
    async fn decoded_bitmap_is_rescaled_to_surface() {
        let surface = rasterize(&Solid([255, 0, 0, 255]), "data:,", &RasterRequest::new(8.0, 4.0))
            .await
            .unwrap();
        assert_eq!((surface.width(), surface.height()), (8, 4));
        assert_eq!(surface.logical_size(), (8.0, 4.0));
        let pixels = surface.to_pixel_data();
        assert_eq!(pixels.len(), 8 * 4 * 4);
        assert_eq!(&pixels[..4], &[255, 0, 0, 255]);
    }

    #[tokio::test]
    async fn canvas_override_sets_logical_size() {
        let mut req = RasterRequest::new(64.0, 32.0);
        req.canvas_width = Some(100.0);
        req.canvas_height = Some(50.0);
        req.pixel_ratio = 2.0;
        let surface = rasterize(&Solid([0, 255, 0, 255]), "data:,", &req).await.unwrap();
        assert_eq!((surface.width(), surface.height()), (200, 100));
        assert_eq!(surface.logical_size(), (100.0, 50.0));
    }

    #[tokio::test]
    async fn encoders_produce_their_formats() {
        let surface = rasterize(&Solid([0, 0, 255, 128]), "data:,", &RasterRequest::new(4.0, 4.0))
            .await
            .unwrap();
        let png = surface.to_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let jpeg = surface.to_blob(OutputFormat::Jpeg, 0.8).unwrap();
        assert_eq!(jpeg.mime_type, "image/jpeg");
        assert_eq!(&jpeg.bytes[..2], &[0xFF, 0xD8]);
        assert!(surface.to_png_data_url().unwrap().starts_with("data:image/png;base64,iVBOR"));
    }

    #[test]
    fn quality_maps_to_percent() {
        assert_eq!(jpeg_quality(1.0), 100);
        assert_eq!(jpeg_quality(0.5), 50);
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(f64::NAN), 100);
    }
}
