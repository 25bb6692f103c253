mod cache_port;
mod decode_port;
mod delivery_port;
mod fetch_port;

pub use cache_port::ResourceCachePort;
pub use decode_port::DecodePort;
pub use delivery_port::{DeliveryJob, DeliveryPort};
pub use fetch_port::FetchPort;
