//! Oxipix - an async remote-image loading and caching library.
//!
//! This crate fetches binary image data over the network, decodes it, caches
//! the decoded payload in memory, and serves repeated requests for the same
//! resource without redundant network or decode work. Concurrent requests
//! for the same resource are coalesced into a single fetch, and every result
//! is delivered on one designated callback context regardless of where the
//! fetch and decode actually ran.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for the domain ports.
pub mod infrastructure;

/// Current version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = "oxipix";
