//! Structured errors surfaced by the extraction and matching paths.
//!
//! [`MatchError`] carries the failure detail; [`ErrorKind`] is the coarse,
//! serializable classification the request layer maps onto a response status.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Coarse error classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The input was not a usable image. Recoverable by supplying another one.
    Decode,
    /// The embedding model failed or timed out. Transient, safe to retry.
    Capability,
    /// Extractor and feature store disagree on the embedding length.
    DimensionMismatch,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::Capability => "capability",
            Self::DimensionMismatch => "dimension_mismatch",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum MatchError {
    #[error("input is not a valid image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to read image at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("embedding model failed: {0:#}")]
    Capability(#[source] anyhow::Error),
    #[error("embedding model did not respond within {0:?}")]
    Timeout(Duration),
    #[error("embedding has {actual} dimensions but {expected} were expected")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl MatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) | Self::Read { .. } => ErrorKind::Decode,
            Self::Capability(_) | Self::Timeout(_) => ErrorKind::Capability,
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
        }
    }

    /// Only model failures are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Capability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_classify_variants() {
        let timeout = MatchError::Timeout(Duration::from_secs(3));
        assert_eq!(timeout.kind(), ErrorKind::Capability);
        assert!(timeout.is_retryable());

        let mismatch = MatchError::DimensionMismatch {
            expected: 1280,
            actual: 3,
        };
        assert_eq!(mismatch.kind(), ErrorKind::DimensionMismatch);
        assert!(!mismatch.is_retryable());
        assert_eq!(
            mismatch.to_string(),
            "embedding has 3 dimensions but 1280 were expected"
        );

        let read = MatchError::Read {
            path: PathBuf::from("a.jpg"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(read.kind(), ErrorKind::Decode);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::DimensionMismatch).unwrap();
        assert_eq!(json, "\"dimension_mismatch\"");
        assert_eq!(ErrorKind::Capability.to_string(), "capability");
    }
}
