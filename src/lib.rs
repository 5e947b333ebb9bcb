//! Sibyl: retrieval-augmented question answering over a local corpus.
//!
//! Documents are fetched, split into overlapping token windows, embedded,
//! and stored in `SQLite`. Queries run a hybrid retrieval (dense vector +
//! keyword, fused by reciprocal rank) and hand the top chunks to a
//! generation backend under a hard deadline, returning an answer with
//! citations and a confidence band.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{SibylError, SibylResult};
pub use domain::models::{Answer, Chunk, Config, Document, IngestReport};
