//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};

use crate::domain::errors::SibylError;
use crate::domain::models::Config;

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .sibyl/config.yaml (project config)
    /// 3. .sibyl/local.yaml (project local overrides, optional)
    /// 4. Environment variables (SIBYL_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".sibyl/config.yaml"))
            .merge(Yaml::file(".sibyl/local.yaml"))
            .merge(Env::prefixed("SIBYL_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("SIBYL_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    ///
    /// Every invalid setting fails startup; a pipeline with a bad chunk
    /// window or zero-dimension embedder would corrupt the index.
    pub fn validate(config: &Config) -> Result<(), SibylError> {
        if config.chunking.chunk_size == 0 {
            return Err(SibylError::Configuration(
                "chunking.chunk_size must be at least 1".to_string(),
            ));
        }

        if config.chunking.chunk_overlap >= config.chunking.chunk_size {
            return Err(SibylError::Configuration(format!(
                "chunking.chunk_overlap ({}) must be less than chunking.chunk_size ({})",
                config.chunking.chunk_overlap, config.chunking.chunk_size
            )));
        }

        if config.embedding.dimension == 0 {
            return Err(SibylError::Configuration(
                "embedding.dimension must be at least 1".to_string(),
            ));
        }

        if config.embedding.model_id.is_empty() {
            return Err(SibylError::Configuration(
                "embedding.model_id cannot be empty".to_string(),
            ));
        }

        if config.embedding.max_input_tokens < config.chunking.chunk_size {
            return Err(SibylError::Configuration(format!(
                "embedding.max_input_tokens ({}) must cover chunking.chunk_size ({})",
                config.embedding.max_input_tokens, config.chunking.chunk_size
            )));
        }

        if config.retrieval.top_k == 0 {
            return Err(SibylError::Configuration(
                "retrieval.top_k must be at least 1".to_string(),
            ));
        }

        if config.retrieval.candidate_multiplier == 0 {
            return Err(SibylError::Configuration(
                "retrieval.candidate_multiplier must be at least 1".to_string(),
            ));
        }

        if config.generation.timeout_secs == 0 {
            return Err(SibylError::Configuration(
                "generation.timeout_secs must be at least 1".to_string(),
            ));
        }

        if config.generation.initial_backoff_ms >= config.generation.max_backoff_ms {
            return Err(SibylError::Configuration(format!(
                "generation.initial_backoff_ms ({}) must be less than generation.max_backoff_ms ({})",
                config.generation.initial_backoff_ms, config.generation.max_backoff_ms
            )));
        }

        if config.database.path.is_empty() {
            return Err(SibylError::Configuration(
                "database.path cannot be empty".to_string(),
            ));
        }

        if config.database.max_connections == 0 {
            return Err(SibylError::Configuration(
                "database.max_connections must be at least 1".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(SibylError::Configuration(format!(
                "logging.level '{}' must be one of: trace, debug, info, warn, error",
                config.logging.level
            )));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(SibylError::Configuration(format!(
                "logging.format '{}' must be one of: json, pretty",
                config.logging.format
            )));
        }

        Ok(())
    }
}
