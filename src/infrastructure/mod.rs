//! Infrastructure layer with adapters for the domain ports.

/// In-memory cache adapter.
pub mod cache;
/// Delivery context adapters.
pub mod delivery;
/// HTTP fetch adapter.
pub mod http;
/// Image decoding and load orchestration.
pub mod image;

pub use cache::{CacheStats, MemoryResourceCache};
pub use delivery::{ChannelDelivery, DeliveryPump};
pub use http::{HttpFetcher, HttpFetcherConfig};
pub use image::{ImageDecoder, ImageLoader, LoadCallback, LoaderConfig, RequestHandle};
