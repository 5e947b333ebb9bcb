//! Domain models for the Sibyl retrieval pipeline.

pub mod answer;
pub mod chunk;
pub mod config;
pub mod document;
pub mod retrieval;

pub use answer::{Answer, ConfidenceLevel, GenerationOutput, GenerationRequest};
pub use chunk::{Chunk, IndexedRecord};
pub use config::{
    ChunkingConfig, Config, DatabaseConfig, EmbeddingConfig, GenerationConfig, LoggingConfig,
    RetrievalConfig,
};
pub use document::{Document, IngestReport, IngestStage};
pub use retrieval::{Channel, Citation, QueryContext, RankedHit, RetrievalResult};
