//! Embedding adapters: a deterministic local embedder and an HTTP client.

pub mod hash;
pub mod http;

pub use hash::HashEmbedder;
pub use http::HttpEmbedder;
