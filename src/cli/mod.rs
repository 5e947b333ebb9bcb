//! Command-line interface.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::domain::models::{Config, LoggingConfig};
use crate::domain::ports::{Embedder, VectorStore};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::embedder::{HashEmbedder, HttpEmbedder};
use crate::infrastructure::fetch::HttpFetcher;
use crate::infrastructure::generator::HttpGenerator;
use crate::infrastructure::store::SqliteVectorStore;
use crate::services::{Ingestor, QueryService, Retriever, Splitter};

/// Document Q&A over a locally indexed corpus.
#[derive(Parser)]
#[command(name = "sibyl", version, about, long_about = None)]
pub struct Cli {
    /// Path to a config file (defaults to .sibyl/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch a document by URL and index it
    Ingest {
        /// Source URL to fetch
        url: String,

        /// Document id; derived from the URL when omitted
        #[arg(long)]
        id: Option<String>,
    },

    /// Index text supplied directly or from a file
    IngestText {
        /// Document id
        id: String,

        /// Text to index; mutually exclusive with --file
        #[arg(conflicts_with = "file")]
        text: Option<String>,

        /// Read the text from this file instead
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Ask a question against the indexed corpus
    Query {
        /// The question to answer
        question: String,
    },

    /// Show index counts and keyword-channel status
    Status,

    /// Remove a document and all its chunks
    Delete {
        /// Document id to remove
        id: String,
    },
}

/// Install the global tracing subscriber from the logging config.
///
/// `RUST_LOG` still wins over the configured level when set. Repeated calls
/// are no-ops so tests sharing a process do not panic.
pub fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    drop(result);
}

impl Cli {
    /// Load the configuration named by `--config`, or the default hierarchy.
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Ok(ConfigLoader::load_from_file(path)?),
            None => Ok(ConfigLoader::load()?),
        }
    }

    pub async fn execute(self, config: Config) -> Result<()> {
        match self.command {
            Commands::Ingest { url, id } => {
                let id = id.unwrap_or_else(|| slug_from_url(&url));
                let ingestor = build_ingestor(&config).await?;
                let report = ingestor.ingest(&id, &url).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Commands::IngestText { id, text, file } => {
                let text = match (text, file) {
                    (Some(text), None) => text,
                    (None, Some(path)) => std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?,
                    _ => anyhow::bail!("provide either text or --file"),
                };
                let ingestor = build_ingestor(&config).await?;
                let report = ingestor.ingest_text(&id, &text).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Commands::Query { question } => {
                let service = build_query_service(&config).await?;
                let answer = service.submit_query(&question).await?;
                println!("{}", serde_json::to_string_pretty(&answer)?);
            }
            Commands::Status => {
                let store = connect_store(&config).await?;
                let stats = store.stats().await?;
                let keyword_index = format!("{:?}", store.keyword_index());
                let status = serde_json::json!({
                    "documents": stats.document_count,
                    "chunks": stats.chunk_count,
                    "keyword_index": keyword_index,
                    "embedding_model": config.embedding.model_id,
                    "database": config.database.path,
                });
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
            Commands::Delete { id } => {
                let ingestor = build_ingestor(&config).await?;
                let removed = ingestor.delete_document(&id).await?;
                println!("{}", serde_json::json!({ "document_id": id, "chunks_removed": removed }));
            }
        }

        Ok(())
    }
}

async fn connect_store(config: &Config) -> Result<SqliteVectorStore> {
    Ok(SqliteVectorStore::connect(&config.database, config.embedding.dimension).await?)
}

fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    match &config.embedding.endpoint {
        Some(endpoint) => Ok(Arc::new(HttpEmbedder::new(
            &config.embedding,
            endpoint.clone(),
        )?)),
        None => Ok(Arc::new(HashEmbedder::new(&config.embedding))),
    }
}

async fn build_ingestor(config: &Config) -> Result<Ingestor> {
    let store: Arc<dyn VectorStore> = Arc::new(connect_store(config).await?);
    Ok(Ingestor::new(
        Arc::new(HttpFetcher::new()?),
        Splitter::new(&config.chunking)?,
        build_embedder(config)?,
        store,
    ))
}

async fn build_query_service(config: &Config) -> Result<QueryService> {
    let store: Arc<dyn VectorStore> = Arc::new(connect_store(config).await?);
    let retriever = Arc::new(Retriever::new(
        build_embedder(config)?,
        store,
        config.retrieval.clone(),
    ));
    let generator = Arc::new(HttpGenerator::new(&config.generation)?);
    Ok(QueryService::new(retriever, generator, &config.generation))
}

/// Derive a stable document id from a URL: alphanumeric runs of the path,
/// lowercased and joined with dashes.
fn slug_from_url(url: &str) -> String {
    let stripped = url
        .trim_start_matches("https://")
        .trim_start_matches("http://");

    let slug: String = stripped
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        "document".to_string()
    } else {
        slug
    }
}
