//! Image decoder backed by the `image` crate.

use std::sync::Arc;

use bytes::Bytes;

use crate::domain::entities::ImagePayload;
use crate::domain::errors::DecodeError;
use crate::domain::ports::DecodePort;

/// Decodes fetched bytes with format auto-detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder;

impl ImageDecoder {
    /// Creates a new decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DecodePort for ImageDecoder {
    fn decode(&self, bytes: &Bytes) -> Result<ImagePayload, DecodeError> {
        image::load_from_memory(bytes)
            .map(Arc::new)
            .map_err(|e| DecodeError::InvalidData(format!("Failed to decode image: {e}")))
    }
}
