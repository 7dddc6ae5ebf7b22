use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Settings for the remote Gemini endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub generation_model: String,
    pub embedding_model: String,
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            generation_model: "gemini-2.0-flash-exp".to_string(),
            embedding_model: "gemini-embedding-001".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Settings for the qdrant vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub url: String,
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            collection: "documents".to_string(),
        }
    }
}

/// Tunable pipeline parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum expanded queries per run (original + alternatives)
    pub max_queries: usize,
    /// Nearest neighbors fetched per expanded query
    pub per_query_limit: usize,
    /// Documents surviving into the final context
    pub final_top_k: usize,
    /// Cross-encoder scores below this for the top 3 candidates
    /// mean the reranked order is discarded
    pub low_confidence_threshold: f32,
    /// Fingerprint only the first N characters when deduplicating.
    /// None fingerprints the full chunk text, which cannot collide
    /// on shared prefixes.
    pub fingerprint_prefix: Option<usize>,
    /// Path to a persona TOML file; None uses the built-in persona
    pub persona_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_queries: 4,
            per_query_limit: 12,
            final_top_k: 6,
            low_confidence_threshold: -10.0,
            fingerprint_prefix: None,
            persona_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the default path, creating default if
    /// it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(path, toml_string)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .context("Could not determine home directory")?;

        Ok(home.join(".ragpipe").join("config.toml"))
    }

    /// Resolve the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.gemini.api_key_env).with_context(|| {
            format!("{} is not set", self.gemini.api_key_env)
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gemini: GeminiConfig::default(),
            store: StoreConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.pipeline.max_queries, 4);
        assert_eq!(config.pipeline.per_query_limit, 12);
        assert_eq!(config.pipeline.final_top_k, 6);
        assert!(config.pipeline.fingerprint_prefix.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.store.collection = "handbook".to_string();

        let toml_string = toml::to_string(&config).unwrap();
        assert!(toml_string.contains("handbook"));

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(deserialized.store.collection, "handbook");
    }

    #[test]
    fn test_config_round_trip_through_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.store.collection = "books".to_string();
        config.pipeline.final_top_k = 8;
        config.pipeline.fingerprint_prefix = Some(200);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.store.collection, "books");
        assert_eq!(loaded.pipeline.final_top_k, 8);
        assert_eq!(loaded.pipeline.fingerprint_prefix, Some(200));
    }

    #[test]
    fn test_load_from_missing_file_creates_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.pipeline.max_queries, 4);
        assert_eq!(config.store.collection, "documents");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("[store]\nurl = \"http://qdrant:6334\"\ncollection = \"kb\"\n").unwrap();
        assert_eq!(config.store.url, "http://qdrant:6334");
        assert_eq!(config.gemini.generation_model, "gemini-2.0-flash-exp");
        assert_eq!(config.pipeline.low_confidence_threshold, -10.0);
    }
}
