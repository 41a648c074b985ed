//! Per-capture resource cache and failure policy

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Semaphore;

use super::{mime_type_for_url, FetchedResource, ResourceFetcher};
use crate::{CaptureOptions, Error, Result};

/// A resource that could not be retrieved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub url: String,
    pub reason: String,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.url, self.reason)
    }
}

impl From<FetchFailure> for Error {
    fn from(failure: FetchFailure) -> Self {
        Error::ResourceFetchError { url: failure.url, reason: failure.reason }
    }
}

type PendingEmbed = Shared<BoxFuture<'static, std::result::Result<String, FetchFailure>>>;

/// Embedded representations keyed by resource, shared by every requester.
///
/// Entries are inserted before the fetch starts, so a second requester of
/// the same key awaits the first one's in-flight future.
#[derive(Default)]
pub struct ResourceCache {
    entries: Mutex<HashMap<String, PendingEmbed>>,
    fetches: AtomicUsize,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fetches issued through this cache
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_or_insert_with<F>(&self, key: &str, start: F) -> PendingEmbed
    where
        F: FnOnce() -> BoxFuture<'static, std::result::Result<String, FetchFailure>>,
    {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(pending) = entries.get(key) {
            debug!("resource cache hit: {}", key);
            return pending.clone();
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let pending = start().shared();
        entries.insert(key.to_string(), pending.clone());
        pending
    }
}

/// Cache key: query stripped unless requested, media type prefixed when known.
pub fn cache_key(url: &str, content_type: Option<&str>, include_query_params: bool) -> String {
    let key = if include_query_params {
        url
    } else {
        url.split('?').next().unwrap_or(url)
    };
    match content_type {
        Some(ct) if !ct.is_empty() => format!("[{}]{}", ct, key),
        _ => key.to_string(),
    }
}

/// State threaded through every embedding call of one capture
pub struct EmbedContext<'a> {
    options: &'a CaptureOptions,
    fetcher: Arc<dyn ResourceFetcher>,
    cache: ResourceCache,
    base_url: Option<String>,
    limiter: Option<Arc<Semaphore>>,
    bust_token: String,
}

impl<'a> EmbedContext<'a> {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, options: &'a CaptureOptions) -> Self {
        let bust_token = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis().to_string())
            .unwrap_or_default();
        Self {
            options,
            fetcher,
            cache: ResourceCache::new(),
            base_url: None,
            limiter: None,
            bust_token,
        }
    }

    /// Document base URL relative image references resolve against
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    /// Bound the number of fetches in flight
    pub fn with_fetch_limit(mut self, limit: usize) -> Self {
        self.limiter = Some(Arc::new(Semaphore::new(limit.max(1))));
        self
    }

    pub fn options(&self) -> &CaptureOptions {
        self.options
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Embedded `data:` URI for an absolute resource URL.
    ///
    /// At most one fetch is issued per cache key; concurrent callers share it.
    pub async fn resource_to_data_url(
        &self,
        url: &str,
        content_type: Option<&str>,
    ) -> std::result::Result<String, FetchFailure> {
        let content_type = content_type.or_else(|| mime_type_for_url(url));
        let key = cache_key(url, content_type, self.options.include_query_params);
        let pending = self.cache.get_or_insert_with(&key, || {
            let fetch_url = self.fetch_url(url);
            let logical_url = url.to_string();
            let content_type = content_type.map(|s| s.to_string());
            let fetch = self.fetcher.fetch(&fetch_url);
            let limiter = self.limiter.clone();
            async move {
                let _permit = match limiter {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                debug!("fetching resource {}", fetch_url);
                match fetch.await {
                    Ok(resource) => Ok(make_data_url(&resource, content_type.as_deref())),
                    Err(err) => Err(FetchFailure { url: logical_url, reason: err.to_string() }),
                }
            }
            .boxed()
        });
        pending.await
    }

    /// Fetch stylesheet text, bypassing the embedding cache.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let fetch = self.fetcher.fetch(&self.fetch_url(url));
        let _permit = match &self.limiter {
            Some(sem) => sem.clone().acquire_owned().await.ok(),
            None => None,
        };
        fetch.await?.to_text()
    }

    /// Apply the failure policy to one resource outcome.
    ///
    /// `Ok(Some(uri))` replaces the reference, `Ok(None)` leaves the original
    /// reference in place after the error handler ran.
    pub fn settle(&self, outcome: std::result::Result<String, FetchFailure>) -> Result<Option<String>> {
        match outcome {
            Ok(uri) => Ok(Some(uri)),
            Err(failure) => {
                if let Some(placeholder) = &self.options.image_placeholder {
                    warn!("Failed to fetch resource {}; using placeholder", failure);
                    Ok(Some(placeholder.clone()))
                } else if let Some(handler) = &self.options.on_image_error_handler {
                    warn!("Failed to fetch resource {}", failure);
                    handler(&failure);
                    Ok(None)
                } else {
                    Err(failure.into())
                }
            }
        }
    }

    fn fetch_url(&self, url: &str) -> String {
        if !self.options.cache_bust {
            return url.to_string();
        }
        let sep = if url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", url, sep, self.bust_token)
    }
}

/// `data:{type};base64,{content}`
pub fn make_data_url(resource: &FetchedResource, content_type: Option<&str>) -> String {
    let content_type = content_type
        .or(resource.content_type.as_deref())
        .unwrap_or("");
    format!("data:{};base64,{}", content_type, resource.to_base64())
}
