//! Service layer orchestrating the domain over the infrastructure ports.

pub mod ingestor;
pub mod query;
pub mod retriever;
pub mod splitter;

pub use ingestor::Ingestor;
pub use query::QueryService;
pub use retriever::{reciprocal_rank_fusion, Retriever};
pub use splitter::Splitter;
