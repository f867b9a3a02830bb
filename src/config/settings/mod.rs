
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;

pub const DEFAULT_LOCAL_MODEL: &str = "nomic-ai/nomic-embed-text-v1.5";
pub const DEFAULT_LOCAL_DIMENSION: u32 = 768;
pub const DEFAULT_GEMINI_EMBEDDING_MODEL: &str = "gemini-embedding-exp-03-07";
pub const DEFAULT_GEMINI_DIMENSION: u32 = 3072;

const DEFAULT_GEMINI_EMBEDDING_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-exp-03-07:embedContent";
const DEFAULT_GEMINI_COMPLETION_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Which embedding family produces and owns the vectors for this deployment.
/// Each family has its own table because cosine comparison requires a single
/// dimensionality per index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Local,
    Gemini,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    pub local_model: String,
    pub local_dimension: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Local,
            local_model: DEFAULT_LOCAL_MODEL.to_string(),
            local_dimension: DEFAULT_LOCAL_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: String,
    pub embedding_endpoint: String,
    pub embedding_model: String,
    pub embedding_dimension: u32,
    pub completion_endpoint: String,
    pub timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            embedding_endpoint: DEFAULT_GEMINI_EMBEDDING_ENDPOINT.to_string(),
            embedding_model: DEFAULT_GEMINI_EMBEDDING_MODEL.to_string(),
            embedding_dimension: DEFAULT_GEMINI_DIMENSION,
            completion_endpoint: DEFAULT_GEMINI_COMPLETION_ENDPOINT.to_string(),
            timeout_seconds: 30,
        }
    }
}

/// How similarity search executes: an in-process cosine scan over all stored
/// vectors, or a delegated query against the store's native vector index.
/// This is a deployment choice made once at startup, not detected at runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Scan,
    Native,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub mode: SearchMode,
    pub candidate_pool: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::Scan,
            candidate_pool: 100,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 8192)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Gemini API key is required when the gemini provider is selected")]
    MissingApiKey,
    #[error("Invalid chunk budget: {0} (must be between 100 and 100000 characters)")]
    InvalidChunkBudget(usize),
    #[error("Invalid candidate pool size: {0} (must be between 1 and 10000)")]
    InvalidCandidatePool(u32),
    #[error("Invalid request timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration directory (`~/.config/ragdocs` on Linux).
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("ragdocs"))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load configuration from `config.toml` in the given directory, falling
    /// back to defaults when the file does not exist. A `GEMINI_API_KEY`
    /// environment variable overrides the persisted key.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;
            toml::from_str::<Config>(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            Config::default()
        };
        config.base_dir = config_dir.as_ref().to_path_buf();

        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                config.gemini.api_key = key;
            }
        }

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.local_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding.local_model.clone()));
        }
        validate_dimension(self.embedding.local_dimension)?;
        validate_dimension(self.gemini.embedding_dimension)?;

        for endpoint in [
            &self.gemini.embedding_endpoint,
            &self.gemini.completion_endpoint,
        ] {
            Url::parse(endpoint).map_err(|_| ConfigError::InvalidUrl(endpoint.clone()))?;
        }

        if self.embedding.provider == ProviderKind::Gemini && self.gemini.api_key.trim().is_empty()
        {
            return Err(ConfigError::MissingApiKey);
        }

        if !(1..=600).contains(&self.gemini.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.gemini.timeout_seconds));
        }

        if !(100..=100_000).contains(&self.chunking.max_chunk_chars) {
            return Err(ConfigError::InvalidChunkBudget(self.chunking.max_chunk_chars));
        }

        if !(1..=10_000).contains(&self.search.candidate_pool) {
            return Err(ConfigError::InvalidCandidatePool(self.search.candidate_pool));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    /// Directory holding the LanceDB tables.
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.base_dir.join("vectors")
    }

    /// Table for the active embedding family. Families are never mixed in one
    /// table because their vectors have different lengths.
    #[inline]
    pub fn table_name(&self) -> &'static str {
        match self.embedding.provider {
            ProviderKind::Local => "document_vectors",
            ProviderKind::Gemini => "gemini_embeddings",
        }
    }

    /// Declared vector dimensionality of the active embedding family.
    #[inline]
    pub fn embedding_dimension(&self) -> usize {
        match self.embedding.provider {
            ProviderKind::Local => self.embedding.local_dimension as usize,
            ProviderKind::Gemini => self.gemini.embedding_dimension as usize,
        }
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            gemini: GeminiConfig::default(),
            search: SearchConfig::default(),
            chunking: ChunkingConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

fn validate_dimension(dimension: u32) -> Result<(), ConfigError> {
    if (64..=8192).contains(&dimension) {
        Ok(())
    } else {
        Err(ConfigError::InvalidEmbeddingDimension(dimension))
    }
}
