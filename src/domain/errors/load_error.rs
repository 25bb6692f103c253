//! Image loading error taxonomy.
//!
//! Errors are `Clone` because one failed fetch fans out to every callback
//! coalesced onto it.

use thiserror::Error;

/// Result type for load operations.
pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// Transport-level failure while fetching resource bytes.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {reason}")]
    Status {
        /// Status code returned by the server.
        status: u16,
        /// Canonical reason phrase, if known.
        reason: String,
    },

    /// The response body could not be read.
    #[error("failed to read body: {0}")]
    Body(String),
}

/// Fetched bytes could not be interpreted as a valid image.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The byte stream is not a recognized image format.
    #[error("failed to decode image: {0}")]
    InvalidData(String),

    /// The background decode task did not run to completion.
    #[error("decode task failed: {0}")]
    TaskFailed(String),
}

/// Top-level error delivered to request callbacks.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The locator was rejected before any work started.
    #[error("invalid locator: {reason}")]
    InvalidLocator {
        /// Why the locator was rejected.
        reason: String,
    },

    /// The network fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The fetched bytes failed to decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl LoadError {
    /// Creates an invalid-locator error.
    #[must_use]
    pub fn invalid_locator(reason: impl Into<String>) -> Self {
        Self::InvalidLocator {
            reason: reason.into(),
        }
    }

    /// Returns whether the failure came from the network.
    #[must_use]
    pub const fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }

    /// Returns whether the failure came from decoding.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
