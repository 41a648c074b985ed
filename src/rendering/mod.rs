//! Serialization and rasterization of captured trees

pub mod raster;
pub mod svg;

#[cfg(feature = "resvg")]
pub mod resvg_decoder;

pub use raster::{rasterize, Blob, RasterRequest, Surface, MAX_CANVAS_SIZE};
pub use svg::VectorDocument;

#[cfg(feature = "resvg")]
pub use resvg_decoder::ResvgDecoder;

use futures::future::BoxFuture;
use image::RgbaImage;

use crate::Result;

/// Decodes a vector document URI into a bitmap.
///
/// This is the "load as image" primitive of the host. Implementations should
/// render at the requested size; a bitmap of another size is rescaled by the
/// rasterizer. Failures map to [`crate::Error::DecodeError`].
pub trait ImageDecoder: Send + Sync {
    fn decode<'a>(&'a self, uri: &'a str, width: u32, height: u32) -> BoxFuture<'a, Result<RgbaImage>>;
}
