//! Port traits that decouple the services layer from infrastructure.

pub mod embedder;
pub mod fetcher;
pub mod generator;
pub mod store;

pub use embedder::Embedder;
pub use fetcher::{DocumentFetcher, FetchedDocument};
pub use generator::Generator;
pub use store::{ScoredRecord, StoreStats, VectorStore};
