//! Infrastructure adapters implementing the domain ports.

pub mod config;
pub mod embedder;
pub mod fetch;
pub mod generator;
pub mod store;
