//! Network fetch port definition.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::errors::FetchError;

/// Port for fetching raw resource bytes over the network.
///
/// Implementations must be thread-safe. One call fetches one locator; the
/// loader owns all request deduplication.
#[async_trait]
pub trait FetchPort: Send + Sync {
    /// Fetches the raw bytes behind a locator.
    ///
    /// # Errors
    /// Returns [`FetchError`] on transport failure or a non-success status.
    async fn fetch(&self, locator: &str) -> Result<Bytes, FetchError>;
}
