use serde::{Deserialize, Serialize};

/// Main configuration structure for Sibyl.
///
/// Built once at startup from defaults, YAML, and `SIBYL_*` environment
/// variables, validated, then passed explicitly to each component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Embedding configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Generation configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Token-window chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Token overlap between consecutive chunks (context preservation)
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

const fn default_chunk_size() -> usize {
    512
}

const fn default_chunk_overlap() -> usize {
    50
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmbeddingConfig {
    /// Identifier of the embedding model. Stored alongside every record so
    /// a model swap is detected instead of silently mixing vector spaces.
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Embedding dimensionality; every stored vector must match.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Maximum input length in tokens before embedding is refused.
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,

    /// Remote embedding endpoint. When unset, the local deterministic
    /// embedder is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Timeout for remote embedding calls, in seconds.
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model_id() -> String {
    "feature-hash-v1".to_string()
}

const fn default_dimension() -> usize {
    384
}

const fn default_max_input_tokens() -> usize {
    8192
}

const fn default_embed_timeout_secs() -> u64 {
    10
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            dimension: default_dimension(),
            max_input_tokens: default_max_input_tokens(),
            endpoint: None,
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

/// Hybrid retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetrievalConfig {
    /// Number of fused chunks handed to the generation step.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Smoothing constant in the reciprocal rank fusion formula
    /// `1 / (rank + rrf_k)`. Damps the dominance of rank-1 items.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: usize,

    /// Each channel fetches `top_k * candidate_multiplier` candidates so
    /// the fusion step has enough material.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,

    /// Whether the keyword channel participates. When false, retrieval is
    /// pure vector order and results are tagged degraded.
    #[serde(default = "default_keyword_enabled")]
    pub keyword_enabled: bool,
}

const fn default_top_k() -> usize {
    5
}

const fn default_rrf_k() -> usize {
    60
}

const fn default_candidate_multiplier() -> usize {
    3
}

const fn default_keyword_enabled() -> bool {
    true
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            rrf_k: default_rrf_k(),
            candidate_multiplier: default_candidate_multiplier(),
            keyword_enabled: default_keyword_enabled(),
        }
    }
}

/// Answer-generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GenerationConfig {
    /// Generation API endpoint.
    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,

    /// Model identifier sent with each request.
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Hard deadline for one answer, in seconds.
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Maximum retries for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// API key (can also be set via SIBYL_GENERATION__API_KEY).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_generation_endpoint() -> String {
    "https://api.x.ai/v1/chat/completions".to_string()
}

fn default_generation_model() -> String {
    "grok-4-latest".to_string()
}

const fn default_generation_timeout_secs() -> u64 {
    28
}

const fn default_temperature() -> f64 {
    0.7
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    8_000
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_generation_endpoint(),
            model: default_generation_model(),
            timeout_secs: default_generation_timeout_secs(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            api_key: None,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to the `SQLite` database file.
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".sibyl/sibyl.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
