//! Domain entity definitions.

mod resource;

pub use resource::{ImagePayload, ResourceKey};
