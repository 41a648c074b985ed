//! Resource fetching and embedding
//!
//! Everything that turns external references into `data:` URIs lives here:
//!
//! - [`ResourceFetcher`]: the injected network boundary
//! - [`EmbedContext`]: per-capture cache and failure policy
//! - [`embed`]: `url()` scanning and substitution in CSS text
//! - [`images`]: `<img>`/background embedding over a cloned tree
//! - [`fonts`]: `@font-face` discovery and embedding

pub mod cache;
pub mod embed;
pub mod fonts;
pub mod images;

pub use cache::{EmbedContext, FetchFailure, ResourceCache};

use base64::Engine as _;
use futures::future::BoxFuture;
use std::future::Future;
use std::path::Path;

use crate::{Error, Result};

/// Body of a fetched resource
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceBody {
    /// Raw bytes, base64-encoded when embedded
    Bytes(Vec<u8>),
    /// Content that is already base64 text
    Base64(String),
}

/// Result of a successful fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedResource {
    pub body: ResourceBody,
    pub content_type: Option<String>,
}

impl FetchedResource {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self { body: ResourceBody::Bytes(bytes), content_type }
    }

    pub fn base64(content: impl Into<String>) -> Self {
        Self { body: ResourceBody::Base64(content.into()), content_type: None }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Body as base64 text
    pub fn to_base64(&self) -> String {
        match &self.body {
            ResourceBody::Bytes(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
            ResourceBody::Base64(text) => text.clone(),
        }
    }

    /// Body as UTF-8 text (stylesheets)
    pub fn to_text(&self) -> Result<String> {
        let bytes = match &self.body {
            ResourceBody::Bytes(bytes) => bytes.clone(),
            ResourceBody::Base64(text) => base64::engine::general_purpose::STANDARD
                .decode(text)
                .map_err(|e| Error::Other(format!("Invalid base64 body: {}", e)))?,
        };
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// The sole network boundary of the pipeline.
///
/// A fetch fails with an error on non-success status. The returned future
/// owns everything it needs so it can be shared between concurrent
/// requesters of the same URL.
pub trait ResourceFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<FetchedResource>>;
}

impl<F, Fut> ResourceFetcher for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FetchedResource>> + Send + 'static,
{
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<FetchedResource>> {
        Box::pin(self(url.to_string()))
    }
}

/// Media type implied by a URL's file extension
pub fn mime_type_for_url(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())?;
    let mime = match ext.as_str() {
        "woff" | "woff2" => "application/font-woff",
        "ttf" => "application/font-truetype",
        "eot" => "application/vnd.ms-fontobject",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime)
}

pub fn is_data_url(url: &str) -> bool {
    url.trim_start()
        .get(..5)
        .map_or(false, |p| p.eq_ignore_ascii_case("data:"))
}

/// Resolve `url` against `base`; unresolvable input is returned unchanged.
pub fn resolve_url(url: &str, base: Option<&str>) -> String {
    let Some(base) = base else {
        return url.to_string();
    };
    url::Url::parse(base)
        .and_then(|b| b.join(url))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

/// Decode a `data:` URL into its bytes and media type.
pub fn decode_data_url(url: &str) -> Result<FetchedResource> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| Error::Other("URL does not start with 'data:'".into()))?;
    let comma = rest
        .find(',')
        .ok_or_else(|| Error::Other("Missing comma in data URL".into()))?;
    let header = &rest[..comma];
    let data = &rest[comma + 1..];
    let media_type = header
        .split(';')
        .next()
        .filter(|s| s.contains('/'))
        .map(|s| s.to_string());
    let bytes = if header.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| Error::Other(format!("Invalid base64 in data URL: {}", e)))?
    } else {
        percent_encoding::percent_decode_str(data).collect()
    };
    Ok(FetchedResource::new(bytes, media_type))
}

#[cfg(feature = "http")]
pub use http::HttpFetcher;

#[cfg(feature = "http")]
mod http {
    use super::{decode_data_url, mime_type_for_url, FetchedResource, ResourceFetcher};
    use crate::{Error, Result};
    use futures::future::{BoxFuture, FutureExt};
    use std::time::Duration;

    const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) domsnap/0.1";

    /// Default fetcher: `http(s)://` over `reqwest`, plus `file://` and `data:`.
    ///
    /// ```no_run
    /// use domsnap::resource::HttpFetcher;
    /// use std::time::Duration;
    ///
    /// let fetcher = HttpFetcher::new()
    ///     .with_timeout(Duration::from_secs(10))
    ///     .with_user_agent("MyApp/1.0");
    /// ```
    #[derive(Debug, Clone)]
    pub struct HttpFetcher {
        client: reqwest::Client,
        timeout: Duration,
        user_agent: String,
        max_size: usize,
    }

    impl HttpFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_timeout(mut self, timeout: Duration) -> Self {
            self.timeout = timeout;
            self
        }

        pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
            self.user_agent = user_agent.into();
            self
        }

        /// Maximum accepted response size in bytes
        pub fn with_max_size(mut self, max_size: usize) -> Self {
            self.max_size = max_size;
            self
        }

        fn fetch_http(&self, url: String) -> BoxFuture<'static, Result<FetchedResource>> {
            let request = self
                .client
                .get(&url)
                .timeout(self.timeout)
                .header("User-Agent", self.user_agent.clone());
            let max_size = self.max_size;
            async move {
                let resp = request
                    .send()
                    .await
                    .map_err(|e| Error::NetworkError(format!("Failed to fetch {}: {}", url, e)))?;
                let resp = resp
                    .error_for_status()
                    .map_err(|e| Error::NetworkError(e.to_string()))?;
                let content_type = resp
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|h| h.to_str().ok())
                    .map(|s| s.to_string());
                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| Error::NetworkError(format!("Failed to read response body: {}", e)))?;
                if bytes.len() > max_size {
                    return Err(Error::NetworkError(format!(
                        "Response for {} exceeds {} bytes",
                        url, max_size
                    )));
                }
                Ok(FetchedResource::new(bytes.to_vec(), content_type))
            }
            .boxed()
        }

        fn fetch_file(url: String) -> BoxFuture<'static, Result<FetchedResource>> {
            async move {
                let path = url.strip_prefix("file://").unwrap_or(&url).to_string();
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| Error::NetworkError(format!("Failed to read {}: {}", path, e)))?;
                let content_type = mime_type_for_url(&path).map(|s| s.to_string());
                Ok(FetchedResource::new(bytes, content_type))
            }
            .boxed()
        }
    }

    impl Default for HttpFetcher {
        fn default() -> Self {
            Self {
                client: reqwest::Client::new(),
                timeout: Duration::from_secs(30),
                user_agent: DEFAULT_USER_AGENT.to_string(),
                max_size: 50 * 1024 * 1024,
            }
        }
    }

    impl ResourceFetcher for HttpFetcher {
        fn fetch(&self, url: &str) -> BoxFuture<'static, Result<FetchedResource>> {
            if url.starts_with("data:") {
                let res = decode_data_url(url);
                async move { res }.boxed()
            } else if url.starts_with("http://") || url.starts_with("https://") {
                self.fetch_http(url.to_string())
            } else {
                Self::fetch_file(url.to_string())
            }
        }
    }
}
