//! Image decode port definition.

use bytes::Bytes;

use crate::domain::entities::ImagePayload;
use crate::domain::errors::DecodeError;

/// Port for decoding fetched bytes into an image payload.
///
/// Implementations are pure and synchronous; the loader moves the call onto
/// a blocking worker so decoding never stalls the async runtime.
pub trait DecodePort: Send + Sync {
    /// Decodes raw bytes into a shared image payload.
    ///
    /// # Errors
    /// Returns [`DecodeError`] if the bytes are not a valid image.
    fn decode(&self, bytes: &Bytes) -> Result<ImagePayload, DecodeError>;
}
