//! Persistence adapters.

pub mod sqlite;

pub use sqlite::{KeywordIndex, SqliteVectorStore};
