//! Domain layer with core entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{ImagePayload, ResourceKey};
pub use errors::{DecodeError, FetchError, LoadError, LoadResult};
pub use ports::{DecodePort, DeliveryJob, DeliveryPort, FetchPort, ResourceCachePort};
