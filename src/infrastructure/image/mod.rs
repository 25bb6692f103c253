//! Image handling infrastructure.
//!
//! This module provides:
//! - Format auto-detecting image decoding
//! - The async load orchestrator with request coalescing
//! - Per-caller cancellation handles

mod decoder;
mod loader;

pub use decoder::ImageDecoder;
pub use loader::{ImageLoader, LoadCallback, LoaderConfig, RequestHandle};
