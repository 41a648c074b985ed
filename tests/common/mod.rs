//! Shared fixtures for integration tests

#![allow(dead_code)]

use domsnap::{FetchedResource, ImageDecoder, Result};
use futures::future::{BoxFuture, FutureExt};
use image::RgbaImage;
use std::sync::{Arc, Mutex};

/// Fetcher answering every URL with `body` and recording what was asked.
#[derive(Clone, Default)]
pub struct RecordingFetcher {
    pub requests: Arc<Mutex<Vec<String>>>,
    pub failing: Vec<String>,
}

impl RecordingFetcher {
    pub fn failing_on(suffix: &str) -> Self {
        Self {
            failing: vec![suffix.to_string()],
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl domsnap::ResourceFetcher for RecordingFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<FetchedResource>> {
        self.requests.lock().unwrap().push(url.to_string());
        let fails = self.failing.iter().any(|s| url.ends_with(s.as_str()));
        let url = url.to_string();
        async move {
            if fails {
                return Err(domsnap::Error::NetworkError(format!("404 for {}", url)));
            }
            if url.ends_with(".css") {
                let css = "@font-face { font-family: 'Imported'; src: url(imported.woff2) format('woff2'); }";
                return Ok(FetchedResource::new(css.as_bytes().to_vec(), Some("text/css".into())));
            }
            Ok(FetchedResource::base64("AAA"))
        }
        .boxed()
    }
}

/// Decoder producing a busy deterministic pattern at the requested size.
pub struct PatternDecoder;

impl ImageDecoder for PatternDecoder {
    fn decode<'a>(&'a self, _uri: &'a str, width: u32, height: u32) -> BoxFuture<'a, Result<RgbaImage>> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([((x * 37) ^ (y * 11)) as u8, (x.wrapping_mul(y)) as u8, (x + y * 3) as u8, 255])
        });
        async move { Ok(img) }.boxed()
    }
}

/// Decoder that always fails.
pub struct BrokenDecoder;

impl ImageDecoder for BrokenDecoder {
    fn decode<'a>(&'a self, _uri: &'a str, _width: u32, _height: u32) -> BoxFuture<'a, Result<RgbaImage>> {
        async { Err(domsnap::Error::DecodeError("not an image".into())) }.boxed()
    }
}

/// Percent-decoded markup of a `data:image/svg+xml` URI
pub fn svg_markup(uri: &str) -> String {
    let encoded = uri
        .strip_prefix("data:image/svg+xml;charset=utf-8,")
        .expect("svg data uri");
    percent_encoding::percent_decode_str(encoded)
        .decode_utf8()
        .expect("utf-8 markup")
        .into_owned()
}
