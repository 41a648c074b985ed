//! Error types for the capture pipeline

use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing a node
#[derive(Error, Debug)]
pub enum Error {
    /// Computed style could not be read for a node (fatal)
    #[error("Failed to capture computed style: {0}")]
    StyleCaptureError(String),

    /// A referenced resource could not be retrieved
    #[error("Failed to fetch resource {url}: {reason}")]
    ResourceFetchError { url: String, reason: String },

    /// The serialized vector document could not be decoded into an image
    #[error("Failed to decode vector document: {0}")]
    DecodeError(String),

    /// Raster extraction failed for the requested format
    #[error("Failed to encode image: {0}")]
    EncodeError(String),

    /// Invalid configuration or options
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Transport-level failure inside a fetcher
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error aborts a capture regardless of configured handlers.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::ResourceFetchError { .. })
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::EncodeError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_errors_are_recoverable() {
        let err = Error::ResourceFetchError {
            url: "http://acme.com/a.png".into(),
            reason: "404".into(),
        };
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Failed to fetch resource http://acme.com/a.png: 404"
        );
        assert!(Error::DecodeError("bad".into()).is_fatal());
    }
}
